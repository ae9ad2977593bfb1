use crate::coordinator::PlaybackCoordinator;
use crate::error::PlaybackError;
use crate::state::{PlaybackStatus, Revision, lock};
use crate::PlaybackOutcome;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub(crate) type StatusCallback = Arc<dyn Fn(PlaybackStatus) + Send + Sync>;

#[derive(Default)]
struct Delivery {
    delivered: Option<Revision>,
    pending: Option<(Revision, PlaybackStatus)>,
    running: bool,
}

/// One registered callback plus its delivery order.
///
/// Snapshots are taken under the state lock but delivered after it is
/// released, so two threads can race to deliver. Each listener only ever
/// moves forward in revision order: an update older than the newest one
/// seen is dropped, and updates arriving while the callback runs (from
/// another thread or from the callback itself) are coalesced and delivered
/// by the running caller once the callback returns.
pub(crate) struct Listener {
    key: String,
    callback: StatusCallback,
    delivery: Mutex<Delivery>,
}

impl Listener {
    fn new(key: String, callback: StatusCallback) -> Self {
        Self {
            key,
            callback,
            delivery: Mutex::new(Delivery::default()),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn deliver(&self, revision: Revision, status: PlaybackStatus) {
        {
            let mut delivery = lock(&self.delivery);
            let newest = delivery
                .pending
                .map(|(r, _)| r)
                .max(delivery.delivered);
            if newest.is_some_and(|r| r >= revision) {
                return;
            }
            delivery.pending = Some((revision, status));
            if delivery.running {
                return;
            }
            delivery.running = true;
        }

        loop {
            let next = {
                let mut delivery = lock(&self.delivery);
                match delivery.pending.take() {
                    Some((revision, status)) => {
                        delivery.delivered = Some(revision);
                        status
                    }
                    None => {
                        delivery.running = false;
                        return;
                    }
                }
            };
            (self.callback)(next);
        }
    }
}

/// Observer list keyed by subscription id.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: u64,
    entries: BTreeMap<u64, Arc<Listener>>,
}

impl SubscriberRegistry {
    pub(crate) fn insert(&mut self, key: String, callback: StatusCallback) -> (u64, Arc<Listener>) {
        self.next_id += 1;
        let listener = Arc::new(Listener::new(key, callback));
        self.entries.insert(self.next_id, listener.clone());
        (self.next_id, listener)
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Copy of the current listeners, so callbacks run without the lock held.
    pub(crate) fn listeners(&self) -> Vec<Arc<Listener>> {
        self.entries.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Registration handle returned by [`PlaybackCoordinator::subscribe`].
///
/// Dropping it deregisters the callback.
pub struct Subscription {
    id: u64,
    key: String,
    registry: Weak<Mutex<SubscriberRegistry>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, key: String, registry: Weak<Mutex<SubscriberRegistry>>) -> Self {
        Self { id, key, registry }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

/// Playback handle for one UI unit (a card, a detail page, a quiz item).
///
/// Mirrors the coordinator's global state for a single key. Dropping it
/// stops playback of that key if it is active.
pub struct PlaybackSubscriber {
    key: String,
    coordinator: PlaybackCoordinator,
    status: watch::Receiver<PlaybackStatus>,
    _subscription: Subscription,
}

impl PlaybackSubscriber {
    pub(crate) fn attach(coordinator: PlaybackCoordinator, key: String) -> Self {
        let (tx, status) = watch::channel(PlaybackStatus::Idle);
        let subscription = coordinator.subscribe(key.clone(), move |next| {
            tx.send_if_modified(|current| {
                let changed = *current != next;
                *current = next;
                changed
            });
        });
        Self {
            key,
            coordinator,
            status,
            _subscription: subscription,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    pub fn is_loading(&self) -> bool {
        self.status().is_loading()
    }

    pub fn is_playing(&self) -> bool {
        self.status().is_playing()
    }

    /// Wait for the next status change. Returns `None` once the coordinator is gone.
    pub async fn changed(&mut self) -> Option<PlaybackStatus> {
        self.status.changed().await.ok()?;
        Some(*self.status.borrow_and_update())
    }

    /// Wait until `predicate` holds for the current status.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&PlaybackStatus) -> bool,
    ) -> Option<PlaybackStatus> {
        self.status.wait_for(predicate).await.ok().map(|s| *s)
    }

    pub fn play(
        &self,
        text: impl Into<String>,
    ) -> JoinHandle<Result<PlaybackOutcome, PlaybackError>> {
        self.coordinator.request(self.key.clone(), text)
    }

    /// Stop if this key is active, otherwise start it.
    pub fn toggle(
        &self,
        text: impl Into<String>,
    ) -> Option<JoinHandle<Result<PlaybackOutcome, PlaybackError>>> {
        self.coordinator.toggle(self.key.clone(), text)
    }

    pub fn stop(&self) -> bool {
        self.coordinator.stop(&self.key)
    }
}

impl Drop for PlaybackSubscriber {
    fn drop(&mut self) {
        self.coordinator.stop(&self.key);
    }
}
