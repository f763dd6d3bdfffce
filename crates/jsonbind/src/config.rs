#![allow(clippy::struct_excessive_bools)]

use std::sync::Arc;

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};

use crate::{cursor::DEFAULT_MAX_DEPTH, json::Json, registry::Registry};

/// How floating-point numbers are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FloatPrecision {
    /// Shortest representation that parses back to the same value.
    #[default]
    Full,
    /// Rounded to six fractional digits, trailing zeros trimmed. Magnitudes
    /// below `5e-7` encode as `0`; values from `1e21` up use exponent form.
    SixDigits,
}

/// Wire-name convention applied to fields that were not renamed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NamingStrategy {
    /// The declared field name, unchanged.
    #[default]
    Identity,
    LowerCamel,
    UpperCamel,
    Snake,
    Kebab,
    ScreamingSnake,
}

impl NamingStrategy {
    #[must_use]
    pub fn apply(self, name: &str) -> String {
        match self {
            Self::Identity => name.to_owned(),
            Self::LowerCamel => name.to_lower_camel_case(),
            Self::UpperCamel => name.to_upper_camel_case(),
            Self::Snake => name.to_snake_case(),
            Self::Kebab => name.to_kebab_case(),
            Self::ScreamingSnake => name.to_shouty_snake_case(),
        }
    }
}

/// Options for encoding and decoding.
///
/// A `Config` is inert until frozen; [`freeze`](Self::freeze) returns a
/// [`Json`] handle with its own codec cache.
///
/// # Examples
///
/// ```rust
/// use jsonbind::{Config, FloatPrecision};
///
/// let json = Config {
///     float_precision: FloatPrecision::SixDigits,
///     ..Config::default()
/// }
/// .freeze();
/// assert_eq!(json.marshal_to_string(&1.234_567_89_f32).unwrap(), "1.234568");
/// ```
///
/// # Default
///
/// Full float precision, case-insensitive field matching, unknown fields
/// skipped, private fields hidden, identity naming, no HTML escaping,
/// unsorted map keys, and a nesting limit of 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// How `f32` and `f64` values are written.
    ///
    /// # Default
    ///
    /// [`FloatPrecision::Full`]
    pub float_precision: FloatPrecision,

    /// Whether object keys must match a field's wire name exactly.
    ///
    /// When `false`, a key that has no exact match is compared again after
    /// lowercasing both sides.
    ///
    /// # Default
    ///
    /// `false`
    pub case_sensitive: bool,

    /// Whether an object key that matches no field is an error.
    ///
    /// When `false`, the value of such a key is skipped.
    ///
    /// # Default
    ///
    /// `false`
    pub disallow_unknown_fields: bool,

    /// Whether fields marked private take part in encoding and decoding.
    ///
    /// # Default
    ///
    /// `false`
    pub support_private_fields: bool,

    /// Convention for wire names of fields without an explicit rename.
    ///
    /// # Default
    ///
    /// [`NamingStrategy::Identity`]
    pub naming: NamingStrategy,

    /// Whether `<`, `>` and `&` inside strings are written as `\u` escapes.
    ///
    /// # Default
    ///
    /// `false`
    pub escape_html: bool,

    /// Whether maps without an inherent order are written with sorted keys.
    ///
    /// # Default
    ///
    /// `false`
    pub sort_map_keys: bool,

    /// Deepest nesting of arrays and objects accepted on decode.
    ///
    /// # Default
    ///
    /// `256`
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            float_precision: FloatPrecision::Full,
            case_sensitive: false,
            disallow_unknown_fields: false,
            support_private_fields: false,
            naming: NamingStrategy::Identity,
            escape_html: false,
            sort_map_keys: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    /// Output that matches what a conservative standard encoder produces:
    /// HTML-safe strings and sorted map keys.
    #[must_use]
    pub fn compatible() -> Self {
        Self {
            escape_html: true,
            sort_map_keys: true,
            ..Self::default()
        }
    }

    /// Trades float precision for speed and compactness.
    #[must_use]
    pub fn fastest() -> Self {
        Self {
            float_precision: FloatPrecision::SixDigits,
            ..Self::default()
        }
    }

    /// Freezes the options against the process-wide registry.
    #[must_use]
    pub fn freeze(self) -> Json {
        self.freeze_with(Arc::clone(Registry::global()))
    }

    /// Freezes the options against an injected registry.
    #[must_use]
    pub fn freeze_with(self, registry: Arc<Registry>) -> Json {
        Json::new(self, registry)
    }
}
