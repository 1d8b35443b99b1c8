use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::clock::{Clock, TokioClock};
use crate::config::SimulatorConfig;
use crate::drivers::{DriverRegistry, MockDriverRegistry};
use crate::error::RideError;
use crate::models::{
    HealthStatus, Ride, RideHistoryEntry, RideOutcome, RideRequest, RideStats, RideStatus,
    RideView,
};
use crate::route::{MockRouteProvider, RouteProvider};
use crate::simulator::RideSimulator;
use crate::store::{RideEventKind, RideStore};

/// Service that owns the ride store and the simulator driving it.
/// This is what the presentation layer talks to.
pub struct RideService {
    store: Arc<RideStore>,
    simulator: RideSimulator,
    /// Service start time for calculating uptime
    start_time: Instant,
    /// Counter for rides paid for (completed or stopped early)
    completed_count: Arc<AtomicU64>,
    /// Counter for rides cancelled after a driver was assigned
    cancelled_count: Arc<AtomicU64>,
}

impl RideService {
    /// Creates the service with the mock route provider and driver registry on
    /// the current tokio runtime.
    pub fn new(config: Option<SimulatorConfig>) -> Result<Self, RideError> {
        let config = config.unwrap_or_default();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::current()?);
        let routes: Arc<dyn RouteProvider> = Arc::new(MockRouteProvider::new(
            config.route_spacing_meters,
            config.route_latency(),
        ));
        let drivers: Arc<dyn DriverRegistry> = Arc::new(MockDriverRegistry::with_defaults(
            config.driver_offset_degrees,
            config.driver_seed,
        ));
        Self::with_collaborators(config, clock, routes, drivers)
    }

    /// Creates the service with injected collaborators. Must be called inside
    /// a tokio runtime, which runs the metrics task.
    ///
    /// # Returns
    /// - Err(RideError::ValidationError) if `config` fails validation
    pub fn with_collaborators(
        config: SimulatorConfig,
        clock: Arc<dyn Clock>,
        routes: Arc<dyn RouteProvider>,
        drivers: Arc<dyn DriverRegistry>,
    ) -> Result<Self, RideError> {
        let store = Arc::new(RideStore::new());
        let simulator = RideSimulator::new(store.clone(), clock, routes, drivers, config)?;
        let service = Self {
            store,
            simulator,
            start_time: Instant::now(),
            completed_count: Arc::new(AtomicU64::new(0)),
            cancelled_count: Arc::new(AtomicU64::new(0)),
        };

        service.start_metrics_collection();
        Ok(service)
    }

    /// Counts finished rides from the store's history events.
    fn start_metrics_collection(&self) {
        let mut rx = self.store.events();
        let completed_count = self.completed_count.clone();
        let cancelled_count = self.cancelled_count.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let RideEventKind::HistoryRecorded(entry) = event.kind {
                            match entry.status {
                                RideOutcome::Completed | RideOutcome::StoppedEarly => {
                                    completed_count.fetch_add(1, Ordering::Relaxed);
                                }
                                RideOutcome::Cancelled => {
                                    cancelled_count.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Metrics collection lagged, skipped {} ride events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn store(&self) -> &Arc<RideStore> {
        &self.store
    }

    pub fn simulator(&self) -> &RideSimulator {
        &self.simulator
    }

    /// Starts a ride.
    ///
    /// # Returns
    /// - Ok(Ride) in SEARCHING
    /// - Err(RideError::ValidationError) if either coordinate is out of range
    /// - Err(RideError::RideInProgress) if a ride is already live
    pub fn request_ride(&self, request: RideRequest) -> Result<Ride, RideError> {
        log::info!(
            "Processing ride request {:?} -> {:?}",
            request.origin,
            request.destination
        );
        self.simulator.request_ride(request.origin, request.destination)
    }

    pub fn accept_match(&self) -> Result<Ride, RideError> {
        self.simulator.accept_match()
    }

    pub fn cancel_ride(&self) -> Result<Option<RideHistoryEntry>, RideError> {
        self.simulator.cancel_ride()
    }

    pub fn stop_ride_early(&self) -> Result<Ride, RideError> {
        self.simulator.stop_ride_early()
    }

    pub fn open_payment(&self) -> Result<Ride, RideError> {
        self.simulator.open_payment()
    }

    pub fn confirm_payment(&self) -> Result<RideHistoryEntry, RideError> {
        self.simulator.confirm_payment()
    }

    pub fn current_ride(&self) -> RideView {
        let ride = self.store.ride();
        RideView {
            status: ride.as_ref().map_or(RideStatus::Idle, |r| r.status),
            ride,
        }
    }

    pub fn history(&self) -> Vec<RideHistoryEntry> {
        self.store.history()
    }

    /// Get health status information for the service
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            ride_status: self.store.status(),
            ride_stats: RideStats {
                completed_count: self.completed_count.load(Ordering::Relaxed),
                cancelled_count: self.cancelled_count.load(Ordering::Relaxed),
                history_size: self.store.history().len(),
            },
        }
    }
}
