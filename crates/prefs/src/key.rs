//! Type-safe keys for preference storage.

use std::{marker::PhantomData, sync::Arc};

use prefs_store::Store;

use crate::codec::{Archived, Codec, CodecMarker, Native};

/// A typed, named preference with a default value.
///
/// Associates a string key name with a value type and a codec at compile time. Constructing a key
/// registers its encoded default with the store, so reads fall back to it until a value is
/// written.
///
/// Two keys are the same logical setting when they share a name and a store. Declaring two keys
/// with the same name but different types on one store is not detected; the last writer wins.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
///
/// use prefs::{Key, Store, SuiteStore};
///
/// let store: Arc<dyn Store> = Arc::new(SuiteStore::new());
/// let launch_count: Key<i64> = Key::new("launch_count", 0, store);
///
/// assert_eq!(launch_count.get(), 0);
/// launch_count.set(1);
/// assert_eq!(launch_count.get(), 1);
/// ```
pub struct Key<T, C = Native> {
    pub(crate) name: String,
    pub(crate) default_value: T,
    pub(crate) store: Arc<dyn Store>,
    _codec: PhantomData<fn() -> C>,
}

impl<T, C: Codec<T>> Key<T, C> {
    /// Create a key and register `default_value` as the fallback for `name` in `store`.
    ///
    /// Registration never replaces a value that is already stored.
    pub fn new(name: impl Into<String>, default_value: T, store: Arc<dyn Store>) -> Self {
        let name = name.into();
        match C::encode(&default_value) {
            Ok(raw) => store.register_default(&name, raw),
            Err(e) => log::warn!("Failed to register default for '{}': {:?}", name, e),
        }

        Self {
            name,
            default_value,
            store,
            _codec: PhantomData,
        }
    }
}

impl<T, C> Key<T, C> {
    /// The storage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value returned while nothing is stored.
    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    /// The store this key reads from and writes to.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

impl<T: Clone, C> Clone for Key<T, C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            default_value: self.default_value.clone(),
            store: self.store.clone(),
            _codec: PhantomData,
        }
    }
}

impl<T: std::fmt::Debug, C> std::fmt::Debug for Key<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("default_value", &self.default_value)
            .field("suite", &self.store.suite_name())
            .finish()
    }
}

/// A typed, named preference without a default. Reads return `None` while nothing is stored.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
///
/// use prefs::{OptionalKey, Store, SuiteStore};
///
/// let store: Arc<dyn Store> = Arc::new(SuiteStore::new());
/// let nickname: OptionalKey<String> = OptionalKey::new("nickname", store);
///
/// assert_eq!(nickname.get(), None);
/// nickname.set(Some("x".to_owned()));
/// assert_eq!(nickname.get().as_deref(), Some("x"));
/// nickname.set(None);
/// assert_eq!(nickname.get(), None);
/// ```
pub struct OptionalKey<T, C = Native> {
    pub(crate) name: String,
    pub(crate) store: Arc<dyn Store>,
    _marker: CodecMarker<T, C>,
}

impl<T, C: Codec<T>> OptionalKey<T, C> {
    /// Create an optional key. Nothing is registered with the store.
    pub fn new(name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        Self {
            name: name.into(),
            store,
            _marker: PhantomData,
        }
    }
}

impl<T, C> OptionalKey<T, C> {
    /// The storage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store this key reads from and writes to.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

impl<T, C> Clone for OptionalKey<T, C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, C> std::fmt::Debug for OptionalKey<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionalKey")
            .field("name", &self.name)
            .field("suite", &self.store.suite_name())
            .finish()
    }
}

/// A [`Key`] bound to the class-checked archive codec.
pub type SecureCodingKey<T> = Key<T, Archived>;

/// An [`OptionalKey`] bound to the class-checked archive codec.
pub type SecureCodingOptionalKey<T> = OptionalKey<T, Archived>;

/// Type-erased view of a key, used for bulk resets.
pub trait AnyKey: Send + Sync {
    /// The storage name.
    fn name(&self) -> &str;

    /// The store holding the key.
    fn store(&self) -> &Arc<dyn Store>;

    /// Restore the key's default, or remove its value for optional keys.
    fn reset(&self);
}
