use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::clock::{CancelToken, Clock};
use crate::config::SimulatorConfig;
use crate::drivers::DriverRegistry;
use crate::error::RideError;
use crate::models::RideStatus;
use crate::route::RouteProvider;
use crate::store::{RideEvent, RideStore, SubscriptionId};

/// Timer-driven controller of the ride lifecycle.
///
/// The simulator arms timers for whatever status the store holds: a one-shot
/// delay for SEARCHING and MATCH_ACCEPTED, a fetch plus a movement tick for
/// DRIVER_ARRIVING and IN_RIDE. Every status change cancels the previous
/// status's timers before new ones are scheduled. Ride fields are only ever
/// written through the [`RideStore`].
pub struct RideSimulator {
    pub(super) inner: Arc<SimulatorInner>,
}

pub(super) struct SimulatorInner {
    pub(super) store: Arc<RideStore>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) routes: Arc<dyn RouteProvider>,
    pub(super) drivers: Arc<dyn DriverRegistry>,
    pub(super) config: SimulatorConfig,
    /// Serializes timer callbacks, route results and user intents
    pub(super) sequencer: Mutex<Sequencer>,
    /// Set when the store's status moved without the sequencer held
    resync_pending: AtomicBool,
    pub(super) weak: Weak<SimulatorInner>,
    subscription: Mutex<Option<SubscriptionId>>,
}

/// State guarded by the sequencer lock.
pub(super) struct Sequencer {
    /// Status the current timers were armed for
    pub(super) armed: RideStatus,
    /// Bumped on every status change; callbacks and fetches from an older
    /// epoch are discarded
    pub(super) epoch: u64,
    pub(super) timers: Vec<CancelToken>,
    pub(super) shut_down: bool,
}

impl Sequencer {
    fn cancel_timers(&mut self) {
        for timer in self.timers.drain(..) {
            timer.cancel();
        }
    }
}

impl RideSimulator {
    /// Creates a simulator bound to `store` and arms it for the store's
    /// current status.
    ///
    /// # Returns
    /// - Err(RideError::ValidationError) if `config` fails validation; a zero
    ///   tick interval or step size would never finish a leg
    pub fn new(
        store: Arc<RideStore>,
        clock: Arc<dyn Clock>,
        routes: Arc<dyn RouteProvider>,
        drivers: Arc<dyn DriverRegistry>,
        config: SimulatorConfig,
    ) -> Result<Self, RideError> {
        config.validate().map_err(RideError::ValidationError)?;

        let inner = Arc::new_cyclic(|weak| SimulatorInner {
            store,
            clock,
            routes,
            drivers,
            config,
            sequencer: Mutex::new(Sequencer {
                armed: RideStatus::Idle,
                epoch: 0,
                timers: Vec::new(),
                shut_down: false,
            }),
            resync_pending: AtomicBool::new(false),
            weak: weak.clone(),
            subscription: Mutex::new(None),
        });

        let weak = inner.weak.clone();
        let id = inner.store.subscribe(Arc::new(move |event: &RideEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_store_event(event);
            }
        }));
        *inner.subscription.lock() = Some(id);

        inner.sequenced(|_| ());
        Ok(Self { inner })
    }

    pub fn store(&self) -> &Arc<RideStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.inner.config
    }

    /// Number of timers armed for the current status.
    pub fn active_timers(&self) -> usize {
        self.inner
            .sequencer
            .lock()
            .timers
            .iter()
            .filter(|t| !t.is_cancelled())
            .count()
    }

    /// Cancels every pending timer and stops following the store. The ride
    /// itself is left as it is.
    pub fn shutdown(&self) {
        if let Some(id) = self.inner.subscription.lock().take() {
            self.inner.store.unsubscribe(id);
        }
        let mut seq = self.inner.sequencer.lock();
        seq.cancel_timers();
        seq.epoch += 1;
        seq.shut_down = true;
        log::info!("Ride simulator shut down");
    }
}

impl Drop for RideSimulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl SimulatorInner {
    /// Runs `f` with the sequencer held, then re-arms timers if the store's
    /// status moved.
    pub(super) fn sequenced<R>(&self, f: impl FnOnce(&mut Sequencer) -> R) -> R {
        let result = {
            let mut seq = self.sequencer.lock();
            let result = f(&mut seq);
            self.resync(&mut seq);
            result
        };
        while self.resync_pending.swap(false, Ordering::AcqRel) {
            let mut seq = self.sequencer.lock();
            self.resync(&mut seq);
        }
        result
    }

    /// Runs `action` only if no status change happened since `epoch`.
    pub(super) fn run_in_epoch(&self, epoch: u64, what: &str, action: impl FnOnce(&Self)) {
        self.sequenced(|seq| {
            if seq.shut_down || seq.epoch != epoch {
                log::debug!("Dropping stale {} from epoch {} (now {})", what, epoch, seq.epoch);
                return;
            }
            action(self);
        });
    }

    fn on_store_event(&self, event: &RideEvent) {
        if !event.status_changed() {
            return;
        }
        self.resync_pending.store(true, Ordering::Release);
        // When the sequencer is held, its owner picks the flag up on release.
        while self.resync_pending.load(Ordering::Acquire) {
            let Some(mut seq) = self.sequencer.try_lock() else {
                return;
            };
            if self.resync_pending.swap(false, Ordering::AcqRel) {
                self.resync(&mut seq);
            }
        }
    }

    fn resync(&self, seq: &mut Sequencer) {
        if seq.shut_down {
            return;
        }
        let status = self.store.status();
        if status == seq.armed {
            return;
        }
        seq.cancel_timers();
        seq.epoch += 1;
        log::info!("Ride status {:?} -> {:?} (epoch {})", seq.armed, status, seq.epoch);
        seq.armed = status;
        self.arm(seq, status);
    }
}
