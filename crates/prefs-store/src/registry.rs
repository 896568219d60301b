use std::{
    collections::HashMap,
    sync::{OnceLock, RwLock},
};

use crate::{store::validate_suite_name, StoreConfiguration, StoreError, SuiteStore};

/// A registry of open suites. Every store opened for the same suite shares one set of data, so a
/// value written through one handle is visible through all others.
///
/// Registries are plain values. [`SuiteRegistry::global`] exists for applications that want a
/// single process-wide registry, but nothing requires using it.
pub struct SuiteRegistry {
    standard: SuiteStore,
    suites: RwLock<HashMap<String, (StoreConfiguration, SuiteStore)>>,
}

impl std::fmt::Debug for SuiteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteRegistry")
            .field("suites", &self.suite_names())
            .finish()
    }
}

impl SuiteRegistry {
    /// Creates a registry with an empty standard suite and no named suites.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        SuiteRegistry {
            standard: SuiteStore::new(),
            suites: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static SuiteRegistry {
        static GLOBAL: OnceLock<SuiteRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SuiteRegistry::new)
    }

    /// The standard suite of this registry.
    pub fn standard(&self) -> SuiteStore {
        self.standard.clone()
    }

    /// Opens a suite, returning the already open handle if the suite is known.
    ///
    /// Opening a suite that is already open with a different configuration fails, so an in-memory
    /// suite can't silently shadow a persisted one.
    pub fn open(&self, configuration: StoreConfiguration) -> Result<SuiteStore, StoreError> {
        let name = match configuration.suite_name() {
            None => return Ok(self.standard()),
            Some(name) if !validate_suite_name(name) => {
                return Err(StoreError::UnsupportedConfiguration(configuration));
            }
            Some(name) => name.to_owned(),
        };

        let mut suites = self.suites.write().expect("RwLock should not be poisoned");
        if let Some((existing, store)) = suites.get(&name) {
            if *existing != configuration {
                return Err(StoreError::ConfigurationConflict(name));
            }
            return Ok(store.clone());
        }

        let store = match &configuration {
            StoreConfiguration::File { suite, folder_path } => {
                SuiteStore::open_file(suite, folder_path)?
            }
            _ => SuiteStore::with_suite(name.clone()),
        };
        log::debug!("Registered suite {}", name);
        suites.insert(name, (configuration, store.clone()));

        Ok(store)
    }

    /// Forgets a named suite. Existing handles keep working on their data, but the next
    /// [`SuiteRegistry::open`] creates a fresh store, re-reading persisted suites from disk.
    pub fn close(&self, name: &str) -> bool {
        self.suites
            .write()
            .expect("RwLock should not be poisoned")
            .remove(name)
            .is_some()
    }

    /// Names of all open named suites.
    pub fn suite_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .suites
            .read()
            .expect("RwLock should not be poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NativeValue, Store};

    #[test]
    fn open_shares_suites() {
        let registry = SuiteRegistry::new();

        let a = registry.open(StoreConfiguration::suite("group.a")).unwrap();
        let a_again = registry.open(StoreConfiguration::suite("group.a")).unwrap();
        let b = registry.open(StoreConfiguration::suite("group.b")).unwrap();

        a.set_raw("k", NativeValue::Integer(1));

        assert!(a.shares_data_with(&a_again));
        assert_eq!(a_again.get_raw("k"), Some(NativeValue::Integer(1)));
        assert_eq!(b.get_raw("k"), None);
        assert_eq!(registry.suite_names(), vec!["group.a", "group.b"]);
    }

    #[test]
    fn standard_is_isolated_from_suites() {
        let registry = SuiteRegistry::new();
        let standard = registry.open(StoreConfiguration::Standard).unwrap();
        let suite = registry.open(StoreConfiguration::suite("group.a")).unwrap();

        standard.set_raw("k", NativeValue::Bool(true));

        assert!(standard.shares_data_with(&registry.standard()));
        assert_eq!(standard.suite_name(), None);
        assert_eq!(suite.get_raw("k"), None);
    }

    #[test]
    fn conflicting_configuration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SuiteRegistry::new();
        registry.open(StoreConfiguration::suite("group.a")).unwrap();

        let result = registry.open(StoreConfiguration::File {
            suite: "group.a".to_owned(),
            folder_path: dir.path().to_path_buf(),
        });

        assert!(matches!(result, Err(StoreError::ConfigurationConflict(_))));
    }

    #[test]
    fn invalid_suite_name_is_rejected() {
        let registry = SuiteRegistry::new();
        let result = registry.open(StoreConfiguration::suite("no/slashes"));

        assert!(matches!(result, Err(StoreError::UnsupportedConfiguration(_))));
    }

    #[test]
    fn close_rereads_file_suites() {
        let dir = tempfile::tempdir().unwrap();
        let configuration = StoreConfiguration::File {
            suite: "group.file".to_owned(),
            folder_path: dir.path().to_path_buf(),
        };
        let registry = SuiteRegistry::new();
        let first = registry.open(configuration.clone()).unwrap();
        first.set_raw("k", NativeValue::from("persisted"));

        assert!(registry.close("group.file"));
        assert!(!registry.close("group.file"));

        let second = registry.open(configuration).unwrap();
        assert!(!first.shares_data_with(&second));
        assert_eq!(second.get_raw("k"), Some(NativeValue::from("persisted")));
    }
}
