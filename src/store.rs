//! Ride state store.
//!
//! Holds the single live [`Ride`] and the append-only history. Every mutation
//! is applied under one write lock and produces exactly one [`RideEvent`]
//! carrying an immutable snapshot, delivered synchronously to listeners and
//! broadcast to async subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::models::{Ride, RideHistoryEntry, RideProgress, RideStatus};

/// Buffer size of the broadcast channel.
const EVENT_BUFFER: usize = 100;

/// What kind of mutation produced an event.
#[derive(Debug, Clone, PartialEq)]
pub enum RideEventKind {
    /// `set_ride` replaced the ride wholesale
    Replaced,
    /// A partial update was merged
    Progress,
    /// The ride was discarded
    Reset,
    /// An entry was appended to the history log
    HistoryRecorded(RideHistoryEntry),
}

/// Notification emitted after every store mutation.
#[derive(Debug, Clone)]
pub struct RideEvent {
    /// Increases by one per mutation
    pub revision: u64,
    pub kind: RideEventKind,
    pub previous_status: RideStatus,
    pub status: RideStatus,
    /// Snapshot of the ride as of this revision
    pub ride: Option<Ride>,
}

impl RideEvent {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.status
    }
}

pub type Listener = Arc<dyn Fn(&RideEvent) + Send + Sync>;

/// Identifies a listener registered with [`RideStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct RideSlot {
    revision: u64,
    ride: Option<Ride>,
}

pub struct RideStore {
    slot: RwLock<RideSlot>,
    history: RwLock<Vec<RideHistoryEntry>>,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_listener: AtomicU64,
    event_tx: broadcast::Sender<RideEvent>,
}

impl Default for RideStore {
    fn default() -> Self {
        Self::new()
    }
}

fn status_of(ride: &Option<Ride>) -> RideStatus {
    ride.as_ref().map_or(RideStatus::Idle, |r| r.status)
}

impl RideStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            slot: RwLock::new(RideSlot::default()),
            history: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            event_tx,
        }
    }

    /// Snapshot of the live ride.
    pub fn ride(&self) -> Option<Ride> {
        self.slot.read().ride.clone()
    }

    /// Reads the live ride without cloning it.
    pub fn with_ride<R>(&self, f: impl FnOnce(&Ride) -> R) -> Option<R> {
        self.slot.read().ride.as_ref().map(f)
    }

    /// `Idle` when no ride is live.
    pub fn status(&self) -> RideStatus {
        status_of(&self.slot.read().ride)
    }

    pub fn revision(&self) -> u64 {
        self.slot.read().revision
    }

    pub fn history(&self) -> Vec<RideHistoryEntry> {
        self.history.read().clone()
    }

    /// Replaces the live ride wholesale.
    pub fn set_ride(&self, ride: Ride) {
        self.commit(RideEventKind::Replaced, |slot| {
            *slot = Some(ride);
            true
        });
    }

    /// Shallow-merges `progress` into the live ride. No-op, and no event,
    /// when no ride is live.
    pub fn update_ride_progress(&self, progress: RideProgress) -> bool {
        self.update_ride_with(|_| Some(progress))
    }

    /// Computes a partial update from the current ride and merges it, all
    /// under one write lock. Returning `None` skips the update.
    pub fn update_ride_with(&self, f: impl FnOnce(&Ride) -> Option<RideProgress>) -> bool {
        self.commit(RideEventKind::Progress, |slot| {
            let Some(ride) = slot.as_mut() else {
                return false;
            };
            match f(&*ride) {
                Some(progress) => {
                    progress.apply(ride);
                    true
                }
                None => false,
            }
        })
    }

    pub fn set_status(&self, status: RideStatus) -> bool {
        self.update_ride_progress(RideProgress::status(status))
    }

    /// Discards the live ride.
    pub fn reset_ride(&self) -> bool {
        self.commit(RideEventKind::Reset, |slot| slot.take().is_some())
    }

    pub fn add_history(&self, entry: RideHistoryEntry) {
        self.history.write().push(entry.clone());
        self.commit(RideEventKind::HistoryRecorded(entry), |_| true);
    }

    /// Registers a listener called synchronously after every mutation.
    ///
    /// Listeners run on the mutating thread after the write lock is released,
    /// so they may read the store freely. They must not block on the simulator.
    pub fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Async stream of the same events the listeners receive.
    pub fn events(&self) -> broadcast::Receiver<RideEvent> {
        self.event_tx.subscribe()
    }

    fn commit(&self, kind: RideEventKind, mutate: impl FnOnce(&mut Option<Ride>) -> bool) -> bool {
        let event = {
            let mut slot = self.slot.write();
            let previous_status = status_of(&slot.ride);
            if !mutate(&mut slot.ride) {
                return false;
            }
            slot.revision += 1;
            RideEvent {
                revision: slot.revision,
                kind,
                previous_status,
                status: status_of(&slot.ride),
                ride: slot.ride.clone(),
            }
        };
        self.notify(event);
        true
    }

    fn notify(&self, event: RideEvent) {
        let listeners: Vec<Listener> = self.listeners.read().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(&event);
        }
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }
}
