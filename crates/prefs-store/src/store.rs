use crate::{NativeValue, Subscription};

/// Callback invoked with the old and new raw value of an observed name.
///
/// `None` means the name had no value (neither stored nor registered as a default).
pub type RawObserver = Box<dyn Fn(Option<&NativeValue>, Option<&NativeValue>) + Send + Sync>;

/// A string-keyed store of [`NativeValue`]s scoped to a suite.
///
/// All operations are synchronous and infallible from the caller's point of view. Implementations
/// that persist data report I/O failures through the `log` facade and keep serving their in-memory
/// state.
pub trait Store: Send + Sync {
    /// Name of the suite this store is bound to, `None` for the standard suite.
    fn suite_name(&self) -> Option<String>;

    /// Returns the stored value for `name`, falling back to its registered default.
    fn get_raw(&self, name: &str) -> Option<NativeValue>;

    /// Stores `value` under `name`, replacing any previous value.
    fn set_raw(&self, name: &str, value: NativeValue);

    /// Removes the stored value for `name`. Its registered default, if any, becomes visible again.
    fn remove_raw(&self, name: &str);

    /// Registers `value` as the fallback for `name`. Never overwrites a stored value.
    fn register_default(&self, name: &str, value: NativeValue);

    /// Subscribes to changes of `name`. Every `set_raw`/`remove_raw` of that name produces exactly
    /// one call to `observer`, in the order the mutations were applied.
    fn observe_raw(&self, name: &str, observer: RawObserver) -> Subscription;

    /// Names that currently hold a stored value. Registered defaults are not included.
    fn managed_names(&self) -> Vec<String>;
}

impl std::fmt::Debug for dyn Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("suite", &self.suite_name())
            .finish()
    }
}

/// Validate that a suite name can be used as a file stem on every supported platform.
/// Valid characters are a-z, A-Z, 0-9, dot (.), dash (-) and underscore (_).
pub const fn validate_suite_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes[0] == b'.' {
        return false;
    }
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if !(byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' || byte == b'_') {
            return false;
        }
        i += 1;
    }
    true
}
