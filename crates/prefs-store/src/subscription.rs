use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, ThreadId},
};

type CancelHook = Box<dyn FnOnce() + Send>;

#[derive(Debug)]
struct FlagState {
    active: AtomicBool,
    /// Held for the whole of a delivery, so cancelling can wait for one that already started.
    gate: Mutex<()>,
    /// Thread currently running a delivery, if any.
    deliverer: Mutex<Option<ThreadId>>,
}

/// Shared flag consulted by a store before every delivery to an observer.
#[derive(Debug, Clone)]
pub struct ActiveFlag(Arc<FlagState>);

/// Clears the recorded deliverer even when the observer panics.
struct Delivering<'a>(&'a FlagState);

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        *lock(&self.0.deliverer) = None;
    }
}

// Observer panics may poison these locks. The guarded state stays consistent either way.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ActiveFlag {
    pub(crate) fn new() -> Self {
        Self(Arc::new(FlagState {
            active: AtomicBool::new(true),
            gate: Mutex::new(()),
            deliverer: Mutex::new(None),
        }))
    }

    /// Returns `true` until the owning [`Subscription`] is cancelled.
    pub fn is_active(&self) -> bool {
        self.0.active.load(Ordering::Acquire)
    }

    /// Run `deliver` unless the subscription has been cancelled.
    ///
    /// The flag is checked while holding the delivery gate, and [`Subscription::cancel`] waits for
    /// the gate, so no delivery runs after `cancel` returns. Returns whether `deliver` ran.
    pub fn deliver(&self, deliver: impl FnOnce()) -> bool {
        let _gate = lock(&self.0.gate);
        if !self.is_active() {
            return false;
        }

        *lock(&self.0.deliverer) = Some(thread::current().id());
        let _delivering = Delivering(&self.0);
        deliver();
        true
    }

    fn clear(&self) -> bool {
        self.0.active.swap(false, Ordering::AcqRel)
    }

    /// Block until a delivery running on another thread has finished.
    fn wait_for_delivery(&self) {
        let current = thread::current().id();
        if *lock(&self.0.deliverer) == Some(current) {
            return;
        }
        drop(lock(&self.0.gate));
    }
}

/// A store-level subscription to raw change notifications for one name.
///
/// Subscriptions are not cancelled on drop. Call [`Subscription::cancel`] explicitly, otherwise
/// the observer stays registered for as long as the store lives.
pub struct Subscription {
    active: ActiveFlag,
    on_cancel: Mutex<Option<CancelHook>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// Create a subscription. `on_cancel` runs once, on the first call to [`Subscription::cancel`].
    ///
    /// Store implementations keep the returned [`ActiveFlag`] with the observer and run every
    /// delivery through [`ActiveFlag::deliver`].
    pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> (Self, ActiveFlag) {
        let active = ActiveFlag::new();
        let subscription = Self {
            active: active.clone(),
            on_cancel: Mutex::new(Some(Box::new(on_cancel))),
        };
        (subscription, active)
    }

    /// Whether notifications are still delivered.
    pub fn is_active(&self) -> bool {
        self.active.is_active()
    }

    /// Stop delivering notifications and release the store-side observer.
    ///
    /// A delivery already running on another thread is waited for, so no callback runs after this
    /// returns. Cancelling twice is a no-op. This may be called from within the observer itself.
    pub fn cancel(&self) {
        if !self.active.clear() {
            return;
        }
        self.active.wait_for_delivery();

        let hook = lock(&self.on_cancel).take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{atomic::AtomicUsize, mpsc},
        time::Duration,
    };

    use super::*;

    #[test]
    fn cancel_runs_hook_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (subscription, flag) = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(subscription.is_active());
        assert!(flag.is_active());

        subscription.cancel();
        subscription.cancel();

        assert!(!subscription.is_active());
        assert!(!flag.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_waits_for_running_delivery() {
        let (subscription, flag) = Subscription::new(|| {});
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();

        let done = finished.clone();
        let deliverer = thread::spawn(move || {
            flag.deliver(|| {
                started_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(100));
                done.store(true, Ordering::SeqCst);
            })
        });

        started_rx.recv().unwrap();
        subscription.cancel();

        assert!(finished.load(Ordering::SeqCst));
        assert!(deliverer.join().unwrap());
    }

    #[test]
    fn cancel_from_inside_delivery_does_not_block() {
        let (subscription, flag) = Subscription::new(|| {});
        let subscription = Arc::new(subscription);

        let inner = subscription.clone();
        assert!(flag.deliver(move || inner.cancel()));

        assert!(!subscription.is_active());
        assert!(!flag.deliver(|| panic!("delivered after cancel")));
    }
}
