//! Per-store namespace of declared keys.

use std::{
    collections::BTreeMap,
    sync::{Arc, OnceLock, RwLock},
};

use prefs_store::{Store, StoreConfiguration, StoreError, SuiteRegistry};

use crate::{
    access,
    codec::Codec,
    key::{AnyKey, Key, OptionalKey},
};

/// A store together with the keys declared on it.
///
/// Keys created through [`Defaults::key`] and [`Defaults::optional_key`] are recorded, which makes
/// them available to [`Defaults::reset_all`]. `Defaults` is a plain value: create one per store
/// and pass it wherever keys are declared. [`Defaults::standard`] is a process-wide convenience
/// instance over the global registry's standard suite.
///
/// ```rust
/// use prefs::{Defaults, Key, OptionalKey};
///
/// let defaults = Defaults::in_memory();
/// let theme: Key<String> = defaults.key("theme", "light".to_owned());
/// let account: OptionalKey<String> = defaults.optional_key("account");
///
/// theme.set("dark".to_owned());
/// account.set(Some("me@example.com".to_owned()));
/// defaults.reset_all();
///
/// assert_eq!(theme.get(), "light");
/// assert_eq!(account.get(), None);
/// ```
pub struct Defaults {
    store: Arc<dyn Store>,
    declared: RwLock<BTreeMap<String, Arc<dyn AnyKey>>>,
}

impl std::fmt::Debug for Defaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Defaults")
            .field("suite", &self.store.suite_name())
            .field("declared", &self.declared_names())
            .finish()
    }
}

impl Defaults {
    /// Wrap an existing store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            declared: RwLock::new(BTreeMap::new()),
        }
    }

    /// A namespace over a fresh, isolated in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(prefs_store::SuiteStore::new()))
    }

    /// The process-wide namespace over the global registry's standard suite.
    pub fn standard() -> &'static Defaults {
        static STANDARD: OnceLock<Defaults> = OnceLock::new();
        STANDARD.get_or_init(|| Defaults::new(Arc::new(SuiteRegistry::global().standard())))
    }

    /// A namespace over a suite opened in `registry`.
    pub fn open(
        registry: &SuiteRegistry,
        configuration: StoreConfiguration,
    ) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(registry.open(configuration)?)))
    }

    /// A namespace over an in-memory suite of the global registry.
    pub fn suite(name: &str) -> Result<Self, StoreError> {
        Self::open(SuiteRegistry::global(), StoreConfiguration::suite(name))
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn record(&self, key: Arc<dyn AnyKey>) {
        let mut declared = self.declared.write().expect("RwLock should not be poisoned");
        if declared.insert(key.name().to_owned(), key).is_some() {
            log::debug!("Key re-declared in suite {:?}", self.store.suite_name());
        }
    }

    /// Declare a key with a default value on this store.
    ///
    /// The codec follows from the requested key type, e.g. `Key<Color, Archived>`.
    pub fn key<T, C>(&self, name: impl Into<String>, default_value: T) -> Key<T, C>
    where
        T: Clone + Send + Sync + 'static,
        C: Codec<T> + 'static,
    {
        let key = Key::new(name, default_value, self.store.clone());
        self.record(Arc::new(key.clone()));
        key
    }

    /// Declare a key without a default on this store.
    pub fn optional_key<T, C>(&self, name: impl Into<String>) -> OptionalKey<T, C>
    where
        T: 'static,
        C: Codec<T> + 'static,
    {
        let key = OptionalKey::new(name, self.store.clone());
        self.record(Arc::new(key.clone()));
        key
    }

    /// Names of all keys declared through this namespace.
    pub fn declared_names(&self) -> Vec<String> {
        self.declared
            .read()
            .expect("RwLock should not be poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Reset every declared key.
    pub fn reset_all(&self) {
        let keys: Vec<Arc<dyn AnyKey>> = self
            .declared
            .read()
            .expect("RwLock should not be poisoned")
            .values()
            .cloned()
            .collect();
        for key in keys {
            key.reset();
        }
    }

    /// Remove every stored value, declared or not. See [`remove_all`](crate::remove_all).
    pub fn remove_all(&self) {
        access::remove_all(self.store.as_ref());
    }
}

impl<T, C> Key<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Codec<T> + 'static,
{
    /// Declare this key on `defaults`. Used by [`declare_keys!`](crate::declare_keys).
    pub fn declare(defaults: &Defaults, name: &str, default_value: T) -> Self {
        defaults.key(name, default_value)
    }
}

impl<T, C> OptionalKey<T, C>
where
    T: 'static,
    C: Codec<T> + 'static,
{
    /// Declare this key on `defaults`. Used by [`declare_keys!`](crate::declare_keys).
    pub fn declare(defaults: &Defaults, name: &str) -> Self {
        defaults.optional_key(name)
    }
}

/// Declare lazily initialized static keys.
///
/// Keys are declared on [`Defaults::standard`] unless a namespace is given with `in <expr>;`. The
/// expression must evaluate to a `&'static Defaults`.
///
/// ```rust
/// use prefs::{declare_keys, Key, OptionalKey};
///
/// declare_keys! {
///     pub static SHOW_HIDDEN: Key<bool> = ("show_hidden", false);
///     static LAST_PATH: OptionalKey<String> = ("last_path");
/// }
///
/// assert!(!SHOW_HIDDEN.get());
/// assert_eq!(SHOW_HIDDEN.name(), "show_hidden");
/// assert_eq!(LAST_PATH.name(), "last_path");
/// ```
#[macro_export]
macro_rules! declare_keys {
    (in $defaults:expr; $($vis:vis static $name:ident : $ty:ty = ($($arg:expr),+ $(,)?);)+) => {
        $(
            $vis static $name: ::std::sync::LazyLock<$ty> =
                ::std::sync::LazyLock::new(|| <$ty>::declare($defaults, $($arg),+));
        )+
    };
    ($($vis:vis static $name:ident : $ty:ty = ($($arg:expr),+ $(,)?);)+) => {
        $crate::declare_keys! {
            in $crate::Defaults::standard();
            $($vis static $name: $ty = ($($arg),+);)+
        }
    };
}
