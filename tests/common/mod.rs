#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use futures::channel::oneshot;
use parking_lot::Mutex;
use taxi_sim::{
    clock::ManualClock,
    config::SimulatorConfig,
    drivers::{DriverAssignment, DriverRegistry},
    error::RideError,
    models::{Coordinate, Driver, RideStatus},
    route::{straight_line, RouteProvider},
    simulator::RideSimulator,
    store::{RideEvent, RideStore},
};

static INIT: Once = Once::new();

/// Route test logs through env_logger; RUST_LOG=debug shows simulator traces
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Pickup used across scenarios (Sükhbaatar Square)
pub fn test_origin() -> Coordinate {
    Coordinate::new(47.9186, 106.9170)
}

pub fn test_destination() -> Coordinate {
    Coordinate::new(47.92, 106.93)
}

/// Where the fixed registry parks its driver
pub fn test_driver_location() -> Coordinate {
    Coordinate::new(47.9236, 106.9170)
}

pub fn test_driver() -> Driver {
    Driver {
        name: "Bat-Erdene".to_string(),
        photo_url: "https://randomuser.me/api/portraits/men/32.jpg".to_string(),
        car_model: "Toyota Prius".to_string(),
        plate_number: "2451 УБА".to_string(),
        rating: 4.8,
        eta_minutes: 2,
    }
}

/// Always hands out the same driver at the same spot.
pub struct FixedDriverRegistry;

impl DriverRegistry for FixedDriverRegistry {
    fn assign(&self, _pickup: Coordinate) -> DriverAssignment {
        DriverAssignment {
            driver: test_driver(),
            location: test_driver_location(),
        }
    }
}

/// Answers immediately with a straight route of `points` coordinates.
pub struct InstantRouteProvider {
    pub points: usize,
    pub calls: AtomicUsize,
}

impl InstantRouteProvider {
    pub fn new(points: usize) -> Self {
        Self {
            points,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl RouteProvider for InstantRouteProvider {
    async fn fetch_route(&self, from: Coordinate, to: Coordinate) -> Result<Vec<Coordinate>, RideError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(straight_line(from, to, self.points))
    }
}

/// Holds every fetch open until the test resolves it.
#[derive(Default)]
pub struct DeferredRouteProvider {
    waiting: Mutex<VecDeque<(Coordinate, Coordinate, oneshot::Sender<Vec<Coordinate>>)>>,
}

impl DeferredRouteProvider {
    pub fn pending(&self) -> usize {
        self.waiting.lock().len()
    }

    /// Completes the oldest open fetch with a straight route of `points`
    /// coordinates. Returns the endpoints that fetch asked for.
    pub fn resolve_next(&self, points: usize) -> Option<(Coordinate, Coordinate)> {
        let (from, to, tx) = self.waiting.lock().pop_front()?;
        let _ = tx.send(straight_line(from, to, points));
        Some((from, to))
    }
}

#[async_trait::async_trait]
impl RouteProvider for DeferredRouteProvider {
    async fn fetch_route(&self, from: Coordinate, to: Coordinate) -> Result<Vec<Coordinate>, RideError> {
        let (tx, rx) = oneshot::channel();
        self.waiting.lock().push_back((from, to, tx));
        rx.await
            .map_err(|_| RideError::RouteUnavailable("fetch abandoned".to_string()))
    }
}

/// Every fetch fails.
#[derive(Default)]
pub struct FailingRouteProvider {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl RouteProvider for FailingRouteProvider {
    async fn fetch_route(&self, _from: Coordinate, _to: Coordinate) -> Result<Vec<Coordinate>, RideError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RideError::RouteUnavailable("routing backend offline".to_string()))
    }
}

/// Store, virtual clock and simulator wired together.
pub struct Harness {
    pub store: Arc<RideStore>,
    pub clock: Arc<ManualClock>,
    pub simulator: RideSimulator,
    /// Statuses in the order the store moved through them
    pub statuses: Arc<Mutex<Vec<RideStatus>>>,
}

impl Harness {
    pub fn new(routes: Arc<dyn RouteProvider>) -> Self {
        Self::with_config(routes, SimulatorConfig::default())
    }

    pub fn with_config(routes: Arc<dyn RouteProvider>, config: SimulatorConfig) -> Self {
        init_logging();
        let store = Arc::new(RideStore::new());
        let clock = Arc::new(ManualClock::new());

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = statuses.clone();
        store.subscribe(Arc::new(move |event: &RideEvent| {
            if event.status_changed() {
                sink.lock().push(event.status);
            }
        }));

        let simulator = RideSimulator::new(
            store.clone(),
            clock.clone(),
            routes,
            Arc::new(FixedDriverRegistry),
            config,
        )
        .unwrap();
        Self {
            store,
            clock,
            simulator,
            statuses,
        }
    }

    pub fn status(&self) -> RideStatus {
        self.store.status()
    }

    pub fn statuses(&self) -> Vec<RideStatus> {
        self.statuses.lock().clone()
    }

    /// Requests the standard ride and drives it to DRIVER_ARRIVING.
    pub fn dispatch(&self) {
        self.simulator
            .request_ride(test_origin(), test_destination())
            .unwrap();
        self.clock.advance_ms(3000);
        self.simulator.accept_match().unwrap();
        self.clock.advance_ms(1000);
        assert_eq!(self.status(), RideStatus::DriverArriving);
    }

    /// Advances one movement tick at a time until the status leaves
    /// `status`. Returns the number of ticks it took.
    pub fn ticks_while(&self, status: RideStatus) -> usize {
        let interval = self.simulator.config().tick_interval_ms;
        let mut ticks = 0;
        while self.status() == status {
            self.clock.advance_ms(interval);
            ticks += 1;
            assert!(ticks < 10_000, "status {:?} never ended", status);
        }
        ticks
    }
}
