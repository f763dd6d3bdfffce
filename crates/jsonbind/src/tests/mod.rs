mod precedence;
mod records;

use std::sync::Arc;

use crate::{Config, Json, Registry};

/// A frozen config over a private registry, so tests never race on the
/// global one.
pub(crate) fn isolated(config: Config) -> (Arc<Registry>, Json) {
    let registry = Arc::new(Registry::new());
    let json = config.freeze_with(Arc::clone(&registry));
    (registry, json)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Person {
    pub(crate) name: String,
    pub(crate) age: u32,
    pub(crate) email: Option<String>,
    pub(crate) nickname: String,
}

crate::record! {
    Person {
        name: String,
        age: u32,
        email: Option<String>,
        #[omit_empty]
        nickname: String => "nick",
    }
}

/// Self-referential through a vector.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Tree {
    pub(crate) value: i32,
    pub(crate) children: Vec<Tree>,
}

crate::record! { Tree { value: i32, children: Vec<Tree> } }

/// Self-referential through an optional box.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Chain {
    pub(crate) id: u8,
    pub(crate) next: Option<Box<Chain>>,
}

crate::record! { Chain { id: u8, next: Option<Box<Chain>> } }
