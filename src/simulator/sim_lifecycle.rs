use time::OffsetDateTime;

use crate::clock::CancelToken;
use crate::error::RideError;
use crate::models::{Coordinate, Ride, RideHistoryEntry, RideOutcome, RideProgress, RideStatus};
use crate::route::{straight_line, RouteProvider};
use crate::simulator::motion;
use crate::simulator::sim_core::{RideSimulator, Sequencer, SimulatorInner};
use crate::simulator::types::Leg;

impl SimulatorInner {
    /// Schedules the timers owned by `status`. Called with the previous
    /// status's timers already cancelled.
    pub(super) fn arm(&self, seq: &mut Sequencer, status: RideStatus) {
        let epoch = seq.epoch;
        match status {
            RideStatus::Searching => {
                let timer = self.schedule_once(epoch, self.config.search_delay(), "search timer", Self::complete_search);
                seq.timers.push(timer);
            }
            RideStatus::Matched => {
                if let Some(delay) = self.config.auto_accept_delay() {
                    let timer = self.schedule_once(epoch, delay, "auto-accept timer", Self::auto_accept);
                    seq.timers.push(timer);
                }
            }
            RideStatus::MatchAccepted => {
                let timer = self.schedule_once(epoch, self.config.accept_delay(), "dispatch timer", Self::dispatch_driver);
                seq.timers.push(timer);
            }
            status if status.is_moving() => {
                if let Some(leg) = Leg::for_status(status) {
                    self.request_route_if_missing(epoch, leg);
                    seq.timers.push(self.schedule_ticks(epoch, leg));
                }
            }
            _ => {}
        }
    }

    fn schedule_once(
        &self,
        epoch: u64,
        delay: std::time::Duration,
        what: &'static str,
        action: fn(&SimulatorInner),
    ) -> CancelToken {
        let weak = self.weak.clone();
        self.clock.after(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.run_in_epoch(epoch, what, action);
                }
            }),
        )
    }

    fn schedule_ticks(&self, epoch: u64, leg: Leg) -> CancelToken {
        let weak = self.weak.clone();
        self.clock.every(
            self.config.tick_interval(),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.run_in_epoch(epoch, "movement tick", |inner| inner.tick(leg));
                }
            }),
        )
    }

    /// SEARCHING -> MATCHED: assign a driver near the pickup and quote the fare.
    fn complete_search(&self) {
        let fares = self.config.fare_schedule();
        let drivers = &self.drivers;
        let matched = self.store.update_ride_with(|ride| {
            if ride.status != RideStatus::Searching {
                return None;
            }
            let assignment = drivers.assign(ride.origin);
            log::info!(
                "Ride {} matched with {} ({}), eta {} min",
                ride.id,
                assignment.driver.name,
                assignment.driver.plate_number,
                assignment.driver.eta_minutes
            );
            Some(RideProgress {
                status: Some(RideStatus::Matched),
                driver: Some(Some(assignment.driver)),
                driver_location: Some(Some(assignment.location)),
                estimated_fare: Some(Some(fares.estimate(ride.origin, ride.destination))),
                ..RideProgress::default()
            })
        });
        if !matched {
            log::debug!("Search timer fired without a searching ride");
        }
    }

    fn auto_accept(&self) {
        self.store.update_ride_with(|ride| {
            (ride.status == RideStatus::Matched).then(|| RideProgress::status(RideStatus::MatchAccepted))
        });
    }

    /// MATCH_ACCEPTED -> DRIVER_ARRIVING with an empty route cache.
    fn dispatch_driver(&self) {
        self.store.update_ride_with(|ride| {
            (ride.status == RideStatus::MatchAccepted).then(|| RideProgress {
                status: Some(RideStatus::DriverArriving),
                route_path: Some(None),
                route_index: Some(0),
                ..RideProgress::default()
            })
        });
    }

    fn tick(&self, leg: Leg) {
        let step = self.config.step_size;
        let fares = self.config.fare_schedule();
        let now = OffsetDateTime::now_utc();
        let applied = self
            .store
            .update_ride_with(|ride| motion::leg_tick(leg, ride, step, &fares, now));
        if !applied {
            log::debug!("Skipping {:?} tick: route not ready", leg);
        }
    }

    fn request_route_if_missing(&self, epoch: u64, leg: Leg) {
        let pending = self
            .store
            .with_ride(|ride| ride.route_path.is_none().then(|| leg.endpoints(ride)))
            .flatten();
        let (from, to) = match pending {
            None => return,
            Some(None) => {
                log::debug!("Cannot route {:?} leg yet: endpoint missing", leg);
                return;
            }
            Some(Some(endpoints)) => endpoints,
        };

        log::info!("Fetching {:?} route {:?} -> {:?}", leg, from, to);
        let routes = self.routes.clone();
        let attempts = self.config.route_fetch_attempts;
        let fallback_points = self.config.fallback_route_points;
        let weak = self.weak.clone();
        self.clock.spawn(Box::pin(async move {
            let path = fetch_with_fallback(routes.as_ref(), from, to, attempts, fallback_points).await;
            if let Some(inner) = weak.upgrade() {
                inner.apply_route(epoch, leg, path);
            }
        }));
    }

    /// Stores a fetched route unless the leg that asked for it has ended.
    fn apply_route(&self, epoch: u64, leg: Leg, path: Vec<Coordinate>) {
        let points = path.len();
        self.run_in_epoch(epoch, "route result", |inner| {
            let stored = inner.store.update_ride_with(|ride| {
                (ride.status == leg.status() && ride.route_path.is_none()).then(|| RideProgress {
                    route_path: Some(Some(path)),
                    route_index: Some(0),
                    ..RideProgress::default()
                })
            });
            if stored {
                log::info!("{:?} route ready with {} points", leg, points);
            }
        });
    }
}

async fn fetch_with_fallback(
    routes: &dyn RouteProvider,
    from: Coordinate,
    to: Coordinate,
    attempts: u32,
    fallback_points: usize,
) -> Vec<Coordinate> {
    for attempt in 1..=attempts {
        match routes.fetch_route(from, to).await {
            Ok(path) if !path.is_empty() => return path,
            Ok(_) => log::warn!("Route provider returned an empty route (attempt {}/{})", attempt, attempts),
            Err(e) => log::warn!("Route fetch failed (attempt {}/{}): {}", attempt, attempts, e),
        }
    }
    log::warn!("Falling back to a straight-line route {:?} -> {:?}", from, to);
    straight_line(from, to, fallback_points)
}

/// User intents. Each runs on the simulator's single timeline.
impl RideSimulator {
    /// Starts a new ride in SEARCHING.
    ///
    /// # Returns
    /// - Ok(ride) with the freshly created ride
    /// - Err(RideError::ValidationError) for out-of-range coordinates
    /// - Err(RideError::RideInProgress) while another ride is live
    pub fn request_ride(&self, origin: Coordinate, destination: Coordinate) -> Result<Ride, RideError> {
        if !origin.is_valid() {
            return Err(RideError::ValidationError("Invalid origin coordinates".to_string()));
        }
        if !destination.is_valid() {
            return Err(RideError::ValidationError("Invalid destination coordinates".to_string()));
        }
        let inner = &self.inner;
        inner.sequenced(|_| {
            let status = inner.store.status();
            if status != RideStatus::Idle {
                return Err(RideError::RideInProgress(status));
            }
            let ride = Ride::new(origin, destination, inner.config.fare_schedule().base());
            log::info!("Ride {} requested {:?} -> {:?}", ride.id, origin, destination);
            inner.store.set_ride(ride.clone());
            Ok(ride)
        })
    }

    /// MATCHED -> MATCH_ACCEPTED.
    pub fn accept_match(&self) -> Result<Ride, RideError> {
        self.transition("accept the match", &[RideStatus::Matched], |_| {
            RideProgress::status(RideStatus::MatchAccepted)
        })
    }

    /// Ends the ride where the vehicle is now. Distance and fare keep what
    /// was accrued so far.
    pub fn stop_ride_early(&self) -> Result<Ride, RideError> {
        self.transition("stop the ride", &[RideStatus::InRide], |ride| RideProgress {
            status: Some(RideStatus::Completed),
            destination: Some(ride.current_location.unwrap_or(ride.origin)),
            route_path: Some(None),
            end_time: Some(Some(OffsetDateTime::now_utc())),
            stopped_early: Some(true),
            ..RideProgress::default()
        })
    }

    /// COMPLETED -> PAYING.
    pub fn open_payment(&self) -> Result<Ride, RideError> {
        self.transition("open payment", &[RideStatus::Completed], |_| {
            RideProgress::status(RideStatus::Paying)
        })
    }

    /// Records the finished ride in the history and resets to idle.
    pub fn confirm_payment(&self) -> Result<RideHistoryEntry, RideError> {
        let inner = &self.inner;
        inner.sequenced(|_| {
            let ride = inner.store.ride().ok_or(RideError::NoActiveRide)?;
            if !matches!(ride.status, RideStatus::Completed | RideStatus::Paying) {
                return Err(RideError::InvalidTransition {
                    action: "confirm payment",
                    status: ride.status,
                });
            }
            let outcome = if ride.stopped_early {
                RideOutcome::StoppedEarly
            } else {
                RideOutcome::Completed
            };
            let entry = RideHistoryEntry::from_ride(&ride, outcome);
            log::info!("Ride {} paid: {} ({:?})", ride.id, entry.fare, outcome);
            inner.store.add_history(entry.clone());
            inner.store.reset_ride();
            Ok(entry)
        })
    }

    /// Discards the live ride from any status. A ride that already had a
    /// driver is recorded as cancelled.
    pub fn cancel_ride(&self) -> Result<Option<RideHistoryEntry>, RideError> {
        let inner = &self.inner;
        inner.sequenced(|_| {
            let ride = inner.store.ride().ok_or(RideError::NoActiveRide)?;
            log::info!("Ride {} cancelled while {:?}", ride.id, ride.status);
            let entry = ride
                .driver
                .is_some()
                .then(|| RideHistoryEntry::from_ride(&ride, RideOutcome::Cancelled));
            if let Some(entry) = &entry {
                inner.store.add_history(entry.clone());
            }
            inner.store.reset_ride();
            Ok(entry)
        })
    }

    fn transition(
        &self,
        action: &'static str,
        from: &[RideStatus],
        progress: impl FnOnce(&Ride) -> RideProgress,
    ) -> Result<Ride, RideError> {
        let inner = &self.inner;
        inner.sequenced(|_| {
            let mut outcome = Err(RideError::NoActiveRide);
            inner.store.update_ride_with(|ride| {
                if !from.contains(&ride.status) {
                    outcome = Err(RideError::InvalidTransition {
                        action,
                        status: ride.status,
                    });
                    return None;
                }
                outcome = Ok(());
                Some(progress(ride))
            });
            outcome?;
            log::info!("Ride intent '{}' applied", action);
            inner.store.ride().ok_or(RideError::NoActiveRide)
        })
    }
}
