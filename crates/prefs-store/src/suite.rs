use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    path::Path,
    sync::{Arc, RwLock, RwLockWriteGuard, Weak},
};

use crate::{
    persistence::SuiteFile,
    store::{validate_suite_name, RawObserver},
    subscription::ActiveFlag,
    NativeValue, Store, StoreConfiguration, StoreError, Subscription,
};

type SharedObserver = Arc<dyn Fn(Option<&NativeValue>, Option<&NativeValue>) + Send + Sync>;

struct Observer {
    id: u64,
    active: ActiveFlag,
    callback: SharedObserver,
}

struct Notification {
    old: Option<NativeValue>,
    new: Option<NativeValue>,
    observers: Vec<(ActiveFlag, SharedObserver)>,
}

#[derive(Default)]
struct SuiteState {
    values: BTreeMap<String, NativeValue>,
    defaults: HashMap<String, NativeValue>,
    observers: HashMap<String, Vec<Observer>>,
    next_observer_id: u64,
    pending: VecDeque<Notification>,
    delivering: bool,
}

impl SuiteState {
    fn effective(&self, name: &str) -> Option<NativeValue> {
        self.values
            .get(name)
            .or_else(|| self.defaults.get(name))
            .cloned()
    }
}

struct SuiteDomain {
    suite: Option<String>,
    file: Option<SuiteFile>,
    state: RwLock<SuiteState>,
}

impl SuiteDomain {
    fn write(&self) -> RwLockWriteGuard<'_, SuiteState> {
        self.state.write().expect("RwLock should not be poisoned")
    }
}

/// Resets the delivery flag if an observer panics, so later notifications are not stuck.
struct DeliveryGuard<'a>(&'a SuiteDomain);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Ok(mut state) = self.0.state.write() {
                state.pending.clear();
                state.delivering = false;
            }
        }
    }
}

/// In-process [`Store`] for one suite.
///
/// Handles are cheap to clone and every clone shares the same data. Change notifications are
/// queued while the write lock is held and delivered after it is released, one at a time and in
/// mutation order, by whichever thread found the queue idle. Observers may therefore read, write
/// or cancel subscriptions on the same store from inside their callback.
#[derive(Clone)]
pub struct SuiteStore {
    domain: Arc<SuiteDomain>,
}

impl std::fmt::Debug for SuiteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteStore")
            .field("suite", &self.domain.suite)
            .field("persistent", &self.domain.file.is_some())
            .finish()
    }
}

impl SuiteStore {
    /// Create an isolated in-memory standard suite. Nothing else shares its data.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::from_parts(None, None, BTreeMap::new())
    }

    /// Create an isolated in-memory store for a named suite.
    ///
    /// Use [`SuiteRegistry::open`](crate::SuiteRegistry::open) to share one suite between handles.
    pub fn with_suite(name: impl Into<String>) -> Self {
        Self::from_parts(Some(name.into()), None, BTreeMap::new())
    }

    /// Open a suite persisted as `<folder_path>/<suite>.json`, loading any values already there.
    pub fn open_file(suite: &str, folder_path: &Path) -> Result<Self, StoreError> {
        if !validate_suite_name(suite) {
            return Err(StoreError::UnsupportedConfiguration(
                StoreConfiguration::File {
                    suite: suite.to_owned(),
                    folder_path: folder_path.to_path_buf(),
                },
            ));
        }

        let file = SuiteFile::new(folder_path, suite);
        let values = file.load()?;
        log::debug!(
            "Opened suite {} from {} with {} values",
            suite,
            file.path().display(),
            values.len()
        );
        Ok(Self::from_parts(Some(suite.to_owned()), Some(file), values))
    }

    fn from_parts(
        suite: Option<String>,
        file: Option<SuiteFile>,
        values: BTreeMap<String, NativeValue>,
    ) -> Self {
        Self {
            domain: Arc::new(SuiteDomain {
                suite,
                file,
                state: RwLock::new(SuiteState {
                    values,
                    ..Default::default()
                }),
            }),
        }
    }

    /// Whether `other` is a handle to the same suite data.
    pub fn shares_data_with(&self, other: &SuiteStore) -> bool {
        Arc::ptr_eq(&self.domain, &other.domain)
    }

    /// Number of observers currently registered across all names.
    pub fn observer_count(&self) -> usize {
        self.domain
            .state
            .read()
            .expect("RwLock should not be poisoned")
            .observers
            .values()
            .map(Vec::len)
            .sum()
    }

    fn mutate(&self, name: &str, value: Option<NativeValue>) {
        let deliver = {
            let mut state = self.domain.write();
            let old = state.effective(name);
            match value {
                Some(value) => {
                    state.values.insert(name.to_owned(), value);
                }
                None => {
                    state.values.remove(name);
                }
            }
            let new = state.effective(name);

            if let Some(file) = &self.domain.file {
                if let Err(e) = file.save(&state.values) {
                    log::error!(
                        "Failed to persist suite to {}: {:?}",
                        file.path().display(),
                        e
                    );
                }
            }

            let observers: Vec<(ActiveFlag, SharedObserver)> = state
                .observers
                .get(name)
                .map(|list| {
                    list.iter()
                        .map(|o| (o.active.clone(), o.callback.clone()))
                        .collect()
                })
                .unwrap_or_default();
            state.pending.push_back(Notification {
                old,
                new,
                observers,
            });

            !std::mem::replace(&mut state.delivering, true)
        };

        if deliver {
            self.drain_notifications();
        }
    }

    fn drain_notifications(&self) {
        let _guard = DeliveryGuard(&self.domain);
        loop {
            let notification = {
                let mut state = self.domain.write();
                match state.pending.pop_front() {
                    Some(notification) => notification,
                    None => {
                        state.delivering = false;
                        return;
                    }
                }
            };

            for (active, callback) in notification.observers {
                active.deliver(|| {
                    callback(notification.old.as_ref(), notification.new.as_ref())
                });
            }
        }
    }
}

impl Store for SuiteStore {
    fn suite_name(&self) -> Option<String> {
        self.domain.suite.clone()
    }

    fn get_raw(&self, name: &str) -> Option<NativeValue> {
        self.domain
            .state
            .read()
            .expect("RwLock should not be poisoned")
            .effective(name)
    }

    fn set_raw(&self, name: &str, value: NativeValue) {
        self.mutate(name, Some(value));
    }

    fn remove_raw(&self, name: &str) {
        self.mutate(name, None);
    }

    fn register_default(&self, name: &str, value: NativeValue) {
        self.domain.write().defaults.insert(name.to_owned(), value);
    }

    fn observe_raw(&self, name: &str, observer: RawObserver) -> Subscription {
        let mut state = self.domain.write();
        let id = state.next_observer_id;
        state.next_observer_id += 1;

        let domain: Weak<SuiteDomain> = Arc::downgrade(&self.domain);
        let observed = name.to_owned();
        let (subscription, active) = Subscription::new(move || {
            let Some(domain) = domain.upgrade() else {
                return;
            };
            let mut state = domain.write();
            if let Some(list) = state.observers.get_mut(&observed) {
                list.retain(|o| o.id != id);
                if list.is_empty() {
                    state.observers.remove(&observed);
                }
            }
            log::debug!("Removed observer {} for {}", id, observed);
        });

        state
            .observers
            .entry(name.to_owned())
            .or_default()
            .push(Observer {
                id,
                active,
                callback: Arc::from(observer),
            });
        log::debug!("Added observer {} for {}", id, name);

        subscription
    }

    fn managed_names(&self) -> Vec<String> {
        self.domain
            .state
            .read()
            .expect("RwLock should not be poisoned")
            .values
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    type Seen = Arc<Mutex<Vec<(Option<NativeValue>, Option<NativeValue>)>>>;

    fn recording_observer() -> (Seen, RawObserver) {
        let seen: Seen = Arc::default();
        let sink = seen.clone();
        let observer: RawObserver =
            Box::new(move |old: Option<&NativeValue>, new: Option<&NativeValue>| {
                sink.lock().unwrap().push((old.cloned(), new.cloned()));
            });
        (seen, observer)
    }

    #[test]
    fn get_falls_back_to_registered_default() {
        let store = SuiteStore::new();
        assert_eq!(store.get_raw("flag"), None);

        store.register_default("flag", NativeValue::Bool(false));
        assert_eq!(store.get_raw("flag"), Some(NativeValue::Bool(false)));

        store.set_raw("flag", NativeValue::Bool(true));
        store.register_default("flag", NativeValue::Bool(false));
        assert_eq!(store.get_raw("flag"), Some(NativeValue::Bool(true)));

        store.remove_raw("flag");
        assert_eq!(store.get_raw("flag"), Some(NativeValue::Bool(false)));
    }

    #[test]
    fn managed_names_excludes_defaults() {
        let store = SuiteStore::new();
        store.register_default("a", NativeValue::from("x"));
        store.set_raw("b", NativeValue::from("y"));

        assert_eq!(store.managed_names(), vec!["b".to_owned()]);
    }

    #[test]
    fn observer_receives_every_mutation() {
        let store = SuiteStore::new();
        let (seen, observer) = recording_observer();
        let subscription = store.observe_raw("name", observer);

        store.set_raw("name", NativeValue::from("a"));
        store.set_raw("name", NativeValue::from("a"));
        store.set_raw("other", NativeValue::from("ignored"));
        store.remove_raw("name");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (None, Some(NativeValue::from("a"))),
                (Some(NativeValue::from("a")), Some(NativeValue::from("a"))),
                (Some(NativeValue::from("a")), None),
            ]
        );
        subscription.cancel();
    }

    #[test]
    fn cancelled_observer_is_removed() {
        let store = SuiteStore::new();
        let (seen, observer) = recording_observer();
        let subscription = store.observe_raw("name", observer);
        assert_eq!(store.observer_count(), 1);

        subscription.cancel();
        subscription.cancel();
        store.set_raw("name", NativeValue::Integer(1));

        assert_eq!(store.observer_count(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn observer_can_write_reentrantly() {
        let store = SuiteStore::new();
        let inner = store.clone();
        let subscription = store.observe_raw(
            "source",
            Box::new(move |_: Option<&NativeValue>, new: Option<&NativeValue>| {
                if let Some(value) = new {
                    inner.set_raw("mirror", value.clone());
                }
            }),
        );

        store.set_raw("source", NativeValue::Integer(5));

        assert_eq!(store.get_raw("mirror"), Some(NativeValue::Integer(5)));
        subscription.cancel();
    }

    #[test]
    fn clones_share_data() {
        let store = SuiteStore::with_suite("group.shared");
        let other = store.clone();
        other.set_raw("k", NativeValue::from("v"));

        assert!(store.shares_data_with(&other));
        assert_eq!(store.get_raw("k"), Some(NativeValue::from("v")));
        assert_eq!(store.suite_name().as_deref(), Some("group.shared"));
    }

    #[test]
    fn file_suite_persists_values_but_not_defaults() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SuiteStore::open_file("group.persist", dir.path()).unwrap();
            store.register_default("fallback", NativeValue::Bool(true));
            store.set_raw("saved", NativeValue::Float(1.5));
        }

        let reopened = SuiteStore::open_file("group.persist", dir.path()).unwrap();
        assert_eq!(reopened.get_raw("saved"), Some(NativeValue::Float(1.5)));
        assert_eq!(reopened.get_raw("fallback"), None);
    }

    #[test]
    fn file_suite_rejects_invalid_names() {
        let dir = tempfile::tempdir().unwrap();
        let result = SuiteStore::open_file("../outside", dir.path());

        assert!(matches!(
            result,
            Err(StoreError::UnsupportedConfiguration(_))
        ));
    }
}
