//! The frozen configuration handle.
use std::{fmt, sync::Arc};

use tracing::{trace, warn};

use crate::{
    Error,
    codec::CompiledCodec,
    compiler::{CodecCache, Compiler},
    config::Config,
    cursor::Cursor,
    descriptor::TypeRef,
    error::BuildError,
    reflect::Reflect,
    registry::Registry,
    stream::Stream,
};

struct Inner {
    config: Config,
    registry: Arc<Registry>,
    cache: CodecCache,
}

/// A frozen [`Config`]: resolves, caches and runs codecs.
///
/// Cloning is cheap and clones share one cache. Handles frozen separately
/// never share a cache, even with equal options. Cached codecs are rebuilt
/// after the registry changes.
///
/// # Examples
///
/// ```rust
/// use jsonbind::{Config, record};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Account {
///     id: u64,
///     tags: Vec<String>,
/// }
/// record! { Account { id: u64, tags: Vec<String> } }
///
/// let json = Config::default().freeze();
/// let mut account = Account::default();
/// json.unmarshal_from_str(r#"{"id": 3, "tags": ["a", "b"]}"#, &mut account).unwrap();
/// assert_eq!(account.tags, ["a", "b"]);
/// assert_eq!(json.marshal_to_string(&account).unwrap(), r#"{"id":3,"tags":["a","b"]}"#);
/// ```
#[derive(Clone)]
pub struct Json {
    inner: Arc<Inner>,
}

impl Json {
    pub(crate) fn new(config: Config, registry: Arc<Registry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                cache: CodecCache::default(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Number of codecs currently cached, stale ones included.
    #[must_use]
    pub fn cached_codecs(&self) -> usize {
        self.inner.cache.len()
    }

    /// # Errors
    ///
    /// See [`resolve_type`](Self::resolve_type).
    pub fn resolve<T: Reflect>(&self) -> Result<CompiledCodec, BuildError> {
        self.resolve_type(TypeRef::of::<T>())
    }

    /// Returns the codec for `ty`, compiling and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] when the type, or a type it contains, has no
    /// JSON representation and no override, or when two of a record's fields
    /// would be written under the same name.
    pub fn resolve_type(&self, ty: TypeRef) -> Result<CompiledCodec, BuildError> {
        let identity = ty.identity();
        let snapshot = self.inner.registry.snapshot();
        if let Some(codec) = self.inner.cache.get(identity.id(), snapshot.generation) {
            trace!(type_name = identity.name(), "codec cache hit");
            return Ok(codec);
        }

        let mut compiler = Compiler::new(&self.inner.config, &snapshot, &self.inner.cache);
        let root = compiler.resolve(ty).inspect_err(|err| {
            warn!(type_name = identity.name(), %err, "codec build failed");
        })?;
        let mut winner = root;
        for codec in compiler.into_finished() {
            let stored = self.inner.cache.publish(codec, snapshot.generation);
            if stored.identity() == identity {
                winner = stored;
            }
        }
        Ok(winner)
    }

    /// Appends the encoding of `value` to `stream`.
    ///
    /// # Errors
    ///
    /// Returns the build error if `T` cannot be resolved. Encoding failures
    /// are latched on `stream`.
    pub fn encode_into<T: Reflect>(
        &self,
        value: &T,
        stream: &mut Stream,
    ) -> Result<(), BuildError> {
        self.resolve::<T>()?.encode(value, stream);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the first error the encoders reported, or the build error.
    pub fn marshal<T: Reflect>(&self, value: &T) -> Result<Vec<u8>, Error> {
        let mut stream = Stream::new();
        self.encode_into(value, &mut stream)?;
        stream.into_result()
    }

    /// # Errors
    ///
    /// As [`marshal`](Self::marshal); a marshaler that produced invalid UTF-8
    /// is reported as [`Error::UnsupportedValue`].
    pub fn marshal_to_string<T: Reflect>(&self, value: &T) -> Result<String, Error> {
        let bytes = self.marshal(value)?;
        String::from_utf8(bytes)
            .map_err(|_| Error::UnsupportedValue("encoded output is not valid UTF-8".to_owned()))
    }

    /// Decodes `input` into `value`, which keeps whatever the input does not
    /// mention. Only whitespace may follow the value.
    ///
    /// # Errors
    ///
    /// Returns the first error the decoders reported, or the build error.
    /// After an error `value` may be partially updated.
    pub fn unmarshal<T: Reflect>(&self, input: &[u8], value: &mut T) -> Result<(), Error> {
        let codec = self.resolve::<T>()?;
        let mut cursor = Cursor::new(input).with_max_depth(self.inner.config.max_depth);
        codec.decode(value, &mut cursor);
        cursor.expect_end();
        match cursor.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// # Errors
    ///
    /// See [`unmarshal`](Self::unmarshal).
    pub fn unmarshal_from_str<T: Reflect>(&self, input: &str, value: &mut T) -> Result<(), Error> {
        self.unmarshal(input.as_bytes(), value)
    }
}

impl Default for Json {
    fn default() -> Self {
        Config::default().freeze()
    }
}

impl fmt::Debug for Json {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Json")
            .field("config", &self.inner.config)
            .field("cached_codecs", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}
