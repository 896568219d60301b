//! Typed change observation.
//!
//! A key observation wraps the store's raw notification for the key's name and decodes every
//! old/new pair through the key's codec before handing it to the callback.

use std::sync::Arc;

use prefs_store::{NativeValue, Store, Subscription};

use crate::{
    access::decode_or_log,
    codec::Codec,
    key::{Key, OptionalKey},
};

/// One observed mutation of a key.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    /// The value before the mutation.
    pub old_value: T,
    /// The value after the mutation.
    pub new_value: T,
}

/// Options controlling what an observation delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationOptions {
    /// Deliver one change immediately on subscribing, with old and new set to the current value.
    pub initial: bool,
    /// Decode the value before the mutation. When disabled, `old_value` is always the key's
    /// default (or `None`).
    pub prior: bool,
}

impl Default for ObservationOptions {
    fn default() -> Self {
        Self {
            initial: false,
            prior: true,
        }
    }
}

impl ObservationOptions {
    /// Default options plus an initial delivery.
    pub fn with_initial() -> Self {
        Self {
            initial: true,
            ..Default::default()
        }
    }
}

/// An active subscription to a key's changes.
///
/// Observations are not cancelled on drop: call [`Observation::invalidate`] or the store keeps
/// the subscription for its whole lifetime. Clones share the same subscription.
#[derive(Debug, Clone)]
pub struct Observation {
    name: Arc<str>,
    subscription: Arc<Subscription>,
}

impl Observation {
    /// The observed key name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether changes are still delivered.
    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }

    /// Stop delivering changes. No callback runs after this returns: a delivery already in
    /// progress on another thread is waited for.
    ///
    /// Safe to call more than once, and from inside the observation's own callback.
    pub fn invalidate(&self) {
        if self.subscription.is_active() {
            log::debug!("Invalidating observation of '{}'", self.name);
        }
        self.subscription.cancel();
    }
}

fn observe_decoded<V: Clone + 'static>(
    store: &dyn Store,
    name: &str,
    options: ObservationOptions,
    decode: impl Fn(Option<&NativeValue>) -> V + Send + Sync + 'static,
    callback: impl Fn(Change<V>) + Send + Sync + 'static,
) -> Observation {
    let decode = Arc::new(decode);
    let callback = Arc::new(callback);

    let subscription = {
        let decode = decode.clone();
        let callback = callback.clone();
        store.observe_raw(
            name,
            Box::new(move |old: Option<&NativeValue>, new: Option<&NativeValue>| {
                let old_value = decode(if options.prior { old } else { None });
                let new_value = decode(new);
                callback(Change {
                    old_value,
                    new_value,
                });
            }),
        )
    };

    if options.initial && subscription.is_active() {
        let current = decode(store.get_raw(name).as_ref());
        callback(Change {
            old_value: current.clone(),
            new_value: current,
        });
    }

    Observation {
        name: name.into(),
        subscription: Arc::new(subscription),
    }
}

impl<T, C> Key<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Codec<T> + 'static,
{
    /// Call `callback` with the old and new value on every write to this key.
    ///
    /// Every underlying write produces one delivery, even when the value did not change.
    /// Callbacks run on the thread that delivers the store's notifications.
    ///
    /// ```rust
    /// use std::sync::{Arc, Mutex};
    ///
    /// use prefs::{Key, ObservationOptions, Store, SuiteStore};
    ///
    /// let store: Arc<dyn Store> = Arc::new(SuiteStore::new());
    /// let volume: Key<i64> = Key::new("volume", 5, store);
    ///
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let sink = seen.clone();
    /// let observation = volume.observe(ObservationOptions::default(), move |change| {
    ///     sink.lock().unwrap().push((change.old_value, change.new_value));
    /// });
    ///
    /// volume.set(7);
    /// observation.invalidate();
    /// volume.set(9);
    ///
    /// assert_eq!(*seen.lock().unwrap(), vec![(5, 7)]);
    /// ```
    pub fn observe(
        &self,
        options: ObservationOptions,
        callback: impl Fn(Change<T>) + Send + Sync + 'static,
    ) -> Observation {
        let name = self.name.clone();
        let default_value = self.default_value.clone();
        observe_decoded(
            self.store.as_ref(),
            &self.name,
            options,
            move |raw| {
                raw.and_then(|raw| decode_or_log::<T, C>(&name, raw))
                    .unwrap_or_else(|| default_value.clone())
            },
            callback,
        )
    }
}

impl<T, C> OptionalKey<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Codec<T> + 'static,
{
    /// Call `callback` with the old and new value on every write or removal of this key.
    pub fn observe(
        &self,
        options: ObservationOptions,
        callback: impl Fn(Change<Option<T>>) + Send + Sync + 'static,
    ) -> Observation {
        let name = self.name.clone();
        observe_decoded(
            self.store.as_ref(),
            &self.name,
            options,
            move |raw| raw.and_then(|raw| decode_or_log::<T, C>(&name, raw)),
            callback,
        )
    }
}
