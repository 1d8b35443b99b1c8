use taxi_sim::{
    config::SimulatorConfig,
    error::RideError,
    models::{Coordinate, RideOutcome, RideRequest, RideStatus},
    service::RideService,
};
use tokio::time::{sleep, Duration};

fn test_request() -> RideRequest {
    RideRequest {
        origin: Coordinate::new(47.9186, 106.9170),
        destination: Coordinate::new(47.92, 106.93),
    }
}

fn seeded_config() -> SimulatorConfig {
    SimulatorConfig {
        driver_seed: Some(42),
        ..SimulatorConfig::default()
    }
}

/// Sleeps in tick-sized steps until the ride reaches `status`.
async fn wait_for(service: &RideService, status: RideStatus) {
    for _ in 0..2000 {
        if service.current_ride().status == status {
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("ride never reached {:?}", status);
}

#[tokio::test(start_paused = true)]
async fn test_ride_runs_to_completion() {
    let service = RideService::new(Some(seeded_config())).unwrap();

    let ride = service.request_ride(test_request()).unwrap();
    assert_eq!(ride.status, RideStatus::Searching);
    assert_eq!(ride.current_fare, 1500);

    sleep(Duration::from_millis(3100)).await;
    let view = service.current_ride();
    assert_eq!(view.status, RideStatus::Matched);
    assert!(view.ride.unwrap().driver.is_some());

    service.accept_match().unwrap();
    wait_for(&service, RideStatus::DriverArriving).await;
    wait_for(&service, RideStatus::InRide).await;
    wait_for(&service, RideStatus::Completed).await;

    let done = service.current_ride().ride.unwrap();
    assert!(done.distance_km > 0.0);
    assert!(done.current_fare >= 1500);
    assert_eq!(service.simulator().active_timers(), 0);

    service.open_payment().unwrap();
    let entry = service.confirm_payment().unwrap();
    assert_eq!(entry.status, RideOutcome::Completed);
    assert_eq!(entry.fare, done.current_fare);

    // Let the metrics task drain the event channel
    sleep(Duration::from_millis(10)).await;
    let health = service.get_health_status();
    assert_eq!(health.ride_status, RideStatus::Idle);
    assert_eq!(health.ride_stats.completed_count, 1);
    assert_eq!(health.ride_stats.cancelled_count, 0);
    assert_eq!(health.ride_stats.history_size, 1);
    assert_eq!(service.history(), vec![entry]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_counts_only_matched_rides() {
    let service = RideService::new(Some(seeded_config())).unwrap();

    service.request_ride(test_request()).unwrap();
    sleep(Duration::from_millis(1000)).await;
    assert!(service.cancel_ride().unwrap().is_none());

    service.request_ride(test_request()).unwrap();
    sleep(Duration::from_millis(3100)).await;
    let entry = service.cancel_ride().unwrap().unwrap();
    assert_eq!(entry.status, RideOutcome::Cancelled);

    sleep(Duration::from_millis(10)).await;
    let stats = service.get_health_status().ride_stats;
    assert_eq!(stats.cancelled_count, 1);
    assert_eq!(stats.completed_count, 0);
    assert_eq!(stats.history_size, 1);

    // Cancelled search timers never fire
    sleep(Duration::from_secs(10)).await;
    assert_eq!(service.current_ride().status, RideStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_auto_accept_from_config() {
    let config = SimulatorConfig {
        auto_accept_delay_ms: 200,
        ..seeded_config()
    };
    let service = RideService::new(Some(config)).unwrap();

    service.request_ride(test_request()).unwrap();
    wait_for(&service, RideStatus::DriverArriving).await;
}

#[tokio::test]
async fn test_request_validation() {
    let service = RideService::new(None).unwrap();

    let result = service.request_ride(RideRequest {
        origin: Coordinate::new(-91.0, 106.9),
        destination: Coordinate::new(47.92, 106.93),
    });
    match result {
        Err(RideError::ValidationError(msg)) => assert_eq!(msg, "Invalid origin coordinates"),
        other => panic!("unexpected result: {:?}", other),
    }

    let result = service.request_ride(RideRequest {
        origin: Coordinate::new(47.9186, 106.9170),
        destination: Coordinate::new(47.92, 181.0),
    });
    match result {
        Err(RideError::ValidationError(msg)) => {
            assert_eq!(msg, "Invalid destination coordinates")
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let view = service.current_ride();
    assert_eq!(view.status, RideStatus::Idle);
    assert!(view.ride.is_none());
}

#[tokio::test]
async fn test_single_live_ride() {
    let service = RideService::new(None).unwrap();
    service.request_ride(test_request()).unwrap();

    let second = service.request_ride(test_request());
    assert!(matches!(second, Err(RideError::RideInProgress(RideStatus::Searching))));
}

#[tokio::test]
async fn test_rejects_invalid_config() {
    let config = SimulatorConfig {
        step_size: 0,
        ..SimulatorConfig::default()
    };
    match RideService::new(Some(config)) {
        Err(RideError::ValidationError(msg)) => assert_eq!(msg, "step_size must be positive"),
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("service accepted a zero step size"),
    }
}

#[test]
fn test_service_needs_a_runtime() {
    assert!(matches!(RideService::new(None), Err(RideError::Internal(_))));
}
