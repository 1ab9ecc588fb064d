use crate::DeviceCategory;
use crate::macros::lock;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Direction of a connection state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConnectionChange {
    /// The device became connected.
    Connected,
    /// The device became disconnected.
    Disconnected,
}

impl ConnectionChange {
    /// Change that leads to the given connected state.
    pub const fn to(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }
}

/// Receiver of connect / disconnect notifications.
///
/// Handlers run synchronously on the notifying thread and must not block.
pub trait ConnectivityObserver: Send + Sync {
    /// Called after `category` changed its connection state.
    fn connection_changed(&self, category: DeviceCategory, change: ConnectionChange);
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<(u64, Weak<dyn ConnectivityObserver>)>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.entries.len())
            .finish()
    }
}

/// Per-device list of connectivity observers.
///
/// Observers are held weakly; the [`Subscription`] returned from
/// [`subscribe`](Self::subscribe) removes the entry when dropped.
#[derive(Debug, Default)]
pub struct ConnectivityNotifier {
    observers: Arc<Mutex<Observers>>,
}

impl ConnectivityNotifier {
    /// Create a notifier with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer until the returned subscription is dropped.
    pub fn subscribe(&self, observer: &Arc<dyn ConnectivityObserver>) -> Subscription {
        let mut observers = lock(&self.observers);
        let id = observers.next_id;
        observers.next_id += 1;
        observers.entries.push((id, Arc::downgrade(observer)));
        Subscription {
            observers: Arc::downgrade(&self.observers),
            id,
        }
    }

    /// Deliver a change to every live observer.
    ///
    /// The observer list isn't locked while handlers run, so handlers may
    /// subscribe or unsubscribe.
    pub fn notify(&self, category: DeviceCategory, change: ConnectionChange) {
        let live = {
            let mut observers = lock(&self.observers);
            observers
                .entries
                .retain(|(_, observer)| observer.strong_count() > 0);
            observers
                .entries
                .iter()
                .filter_map(|(_, observer)| observer.upgrade())
                .collect::<Vec<_>>()
        };

        tracing::debug!(%category, %change, observers = live.len(), "Connectivity changed");

        for observer in live {
            observer.connection_changed(category, change);
        }
    }

    /// Number of registered observers that are still alive.
    pub fn observer_count(&self) -> usize {
        lock(&self.observers)
            .entries
            .iter()
            .filter(|(_, observer)| observer.strong_count() > 0)
            .count()
    }
}

/// Registration of one observer with one notifier.
#[must_use = "dropping a subscription unregisters the observer"]
#[derive(Debug)]
pub struct Subscription {
    observers: Weak<Mutex<Observers>>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            lock(&observers).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

/// A set of subscriptions released together.
#[must_use = "dropping subscriptions unregisters the observers"]
#[derive(Debug, Default)]
pub struct Subscriptions(Vec<Subscription>);

impl Subscriptions {
    /// Number of held subscriptions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no subscriptions are held.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Subscription> for Subscriptions {
    fn from_iter<T: IntoIterator<Item = Subscription>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
