//! Process-wide backend connectivity flag with change notifications.
//!
//! # State transitions
//! ```text
//! connected → disconnected: a request exhausted its retry budget
//! disconnected → connected: any request received a 2xx response
//! ```
//!
//! The flag reflects recent request outcomes; it is not a live socket check.
//! Listeners run synchronously on the task that observed the transition, in
//! subscription order, and only when the value actually changes. A panicking
//! listener is caught and logged; the remaining listeners still run and the
//! request that caused the transition is unaffected.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

/// Callback invoked with the new connection state.
pub type ConnectionListener = Arc<dyn Fn(bool) + Send + Sync>;

static GLOBAL: OnceLock<Arc<ConnectionMonitor>> = OnceLock::new();

/// Shared connectivity flag and its listener registry.
pub struct ConnectionMonitor {
    connected: AtomicBool,
    // Serializes swap + fan-out so listeners see transitions in flag order.
    transition: Mutex<()>,
    listeners: Mutex<Vec<(u64, ConnectionListener)>>,
    next_id: AtomicU64,
}

impl fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("connected", &self.is_connected())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    /// Creates a monitor in the connected state with no listeners.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            transition: Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The process-wide monitor shared by every client built without
    /// [`CrmClient::with_connection_monitor`](crate::CrmClient::with_connection_monitor).
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Current connection state. No side effects.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Registers `listener` for every future transition.
    ///
    /// Listeners should not block; they run while later transitions wait.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.subscribe_listener(Arc::new(listener))
    }

    /// Registers an already shared listener.
    ///
    /// The same callback may be registered more than once; each registration
    /// fires independently and is removed by its own [`Subscription`].
    pub fn subscribe_listener(self: &Arc<Self>, listener: ConnectionListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, listener));
        Subscription {
            id,
            monitor: Arc::downgrade(self),
        }
    }

    /// Sets the flag and notifies listeners if the value changed.
    ///
    /// Returns whether a transition happened.
    pub(crate) fn set_connected(&self, connected: bool) -> bool {
        let _transition = lock(&self.transition);
        if self.connected.swap(connected, Ordering::SeqCst) == connected {
            return false;
        }

        #[cfg(feature = "tracing")]
        {
            if connected {
                tracing::info!("backend connection restored");
            } else {
                tracing::warn!("backend connection lost");
            }
        }

        // Snapshot so listeners can (un)subscribe from inside the callback.
        let snapshot: Vec<(u64, ConnectionListener)> = lock(&self.listeners)
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();
        for (id, listener) in snapshot {
            if !self.is_registered(id) {
                continue;
            }
            if panic::catch_unwind(AssertUnwindSafe(|| listener(connected))).is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!(listener = id, connected, "connection listener panicked");
            }
        }
        true
    }

    fn is_registered(&self, id: u64) -> bool {
        lock(&self.listeners).iter().any(|(entry, _)| *entry == id)
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(entry, _)| *entry != id);
        listeners.len() != before
    }
}

/// Handle returned by [`ConnectionMonitor::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
#[must_use = "dropping a Subscription keeps the listener registered; keep it to unsubscribe later"]
pub struct Subscription {
    id: u64,
    monitor: Weak<ConnectionMonitor>,
}

impl Subscription {
    /// Removes exactly this registration. Other listeners, including other
    /// registrations of the same closure, are unaffected.
    ///
    /// Returns `false` if the registration was already gone.
    pub fn unsubscribe(self) -> bool {
        self.monitor
            .upgrade()
            .is_some_and(|monitor| monitor.remove(self.id))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
