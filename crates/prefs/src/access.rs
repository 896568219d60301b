//! Typed reads and writes through keys.
//!
//! Reads never fail: a missing value yields the key's default (or `None`), and a value that can't
//! be decoded is logged and treated the same way. Writes that can't be encoded are logged and
//! dropped.

use std::sync::Arc;

use prefs_store::{NativeValue, Store};

use crate::{
    codec::Codec,
    key::{AnyKey, Key, OptionalKey},
};

/// Decode `raw`, logging and discarding failures.
pub(crate) fn decode_or_log<T, C: Codec<T>>(name: &str, raw: &NativeValue) -> Option<T> {
    match C::decode(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Failed to decode preference '{}': {:?}", name, e);
            None
        }
    }
}

fn write<T, C: Codec<T>>(store: &dyn Store, name: &str, value: &T) {
    match C::encode(value) {
        Ok(raw) => store.set_raw(name, raw),
        Err(e) => log::warn!("Failed to encode preference '{}': {:?}", name, e),
    }
}

impl<T: Clone, C: Codec<T>> Key<T, C> {
    /// Get the current value, falling back to the default when nothing is stored or the stored
    /// value can't be decoded.
    pub fn get(&self) -> T {
        self.store
            .get_raw(&self.name)
            .and_then(|raw| decode_or_log::<T, C>(&self.name, &raw))
            .unwrap_or_else(|| self.default_value.clone())
    }

    /// Store a new value.
    pub fn set(&self, value: T) {
        write::<T, C>(self.store.as_ref(), &self.name, &value);
    }

    /// Store the default value again.
    pub fn reset(&self) {
        write::<T, C>(self.store.as_ref(), &self.name, &self.default_value);
    }

    /// Read the value, let `f` modify it and store the result.
    ///
    /// Not atomic: a concurrent write between the read and the write is lost.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }

    /// Whether the current value equals the default.
    pub fn is_default_value(&self) -> bool
    where
        T: PartialEq,
    {
        self.get() == self.default_value
    }
}

impl<T, C: Codec<T>> OptionalKey<T, C> {
    /// Get the current value, or `None` if nothing is stored or the stored value can't be decoded.
    pub fn get(&self) -> Option<T> {
        self.store
            .get_raw(&self.name)
            .and_then(|raw| decode_or_log::<T, C>(&self.name, &raw))
    }

    /// Store a value. `None` removes the entry instead of storing a placeholder.
    pub fn set(&self, value: Option<T>) {
        match value {
            Some(value) => write::<T, C>(self.store.as_ref(), &self.name, &value),
            None => self.store.remove_raw(&self.name),
        }
    }

    /// Remove the stored value.
    pub fn reset(&self) {
        self.store.remove_raw(&self.name);
    }

    /// Remove the stored value and return what it was.
    pub fn take(&self) -> Option<T> {
        let value = self.get();
        if value.is_some() {
            self.reset();
        }
        value
    }
}

impl<T, C> AnyKey for Key<T, C>
where
    T: Clone + Send + Sync,
    C: Codec<T>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn reset(&self) {
        Key::reset(self);
    }
}

impl<T, C: Codec<T>> AnyKey for OptionalKey<T, C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn reset(&self) {
        OptionalKey::reset(self);
    }
}

/// Reset each of `keys`. Keys not listed keep their values.
///
/// ```rust
/// use std::sync::Arc;
///
/// use prefs::{Key, Store, SuiteStore};
///
/// let store: Arc<dyn Store> = Arc::new(SuiteStore::new());
/// let a: Key<String> = Key::new("a", "foo1".to_owned(), store.clone());
/// let b: Key<String> = Key::new("b", "foo2".to_owned(), store);
/// a.set("bar1".to_owned());
/// b.set("bar2".to_owned());
///
/// prefs::reset(&[&a]);
///
/// assert_eq!(a.get(), "foo1");
/// assert_eq!(b.get(), "bar2");
/// ```
pub fn reset(keys: &[&dyn AnyKey]) {
    for key in keys {
        key.reset();
    }
}

/// Remove every value stored in `store`. Afterwards each key reads as its default or `None`.
///
/// Meant for maintenance and tests, not for regular application flow.
pub fn remove_all(store: &dyn Store) {
    let names = store.managed_names();
    log::debug!(
        "Removing {} values from suite {:?}",
        names.len(),
        store.suite_name()
    );
    for name in names {
        store.remove_raw(&name);
    }
}
