//! Per-tick movement and fare accrual.
//!
//! Pure functions from the current ride to the partial update a tick
//! applies. A leg of `n` route points completes in `ceil(n / step)` ticks.

use time::OffsetDateTime;

use crate::geo::{bearing_degrees, distance_meters};
use crate::models::{Ride, RideProgress, RideStatus};
use crate::pricing::FareSchedule;
use crate::simulator::types::Leg;

/// Tick of the leg matching the ride's status. `None` means skip the tick.
pub(crate) fn leg_tick(
    leg: Leg,
    ride: &Ride,
    step: usize,
    fares: &FareSchedule,
    now: OffsetDateTime,
) -> Option<RideProgress> {
    if ride.status != leg.status() {
        return None;
    }
    match leg {
        Leg::Arrival => arrival_tick(ride, step),
        Leg::Trip => trip_tick(ride, step, fares, now),
    }
}

/// Moves the driver towards the pickup; hands over to `InRide` once the
/// next step would run off the route.
pub(crate) fn arrival_tick(ride: &Ride, step: usize) -> Option<RideProgress> {
    let path = ride.route_path.as_ref().filter(|p| !p.is_empty())?;
    let index = ride.route_index.min(path.len() - 1);

    if index + step >= path.len() {
        let arrived = *path.last()?;
        return Some(RideProgress {
            status: Some(RideStatus::InRide),
            route_path: Some(None),
            route_index: Some(0),
            driver_location: Some(Some(arrived)),
            current_location: Some(Some(arrived)),
            bearing: Some(Some(0.0)),
            ..RideProgress::default()
        });
    }

    let next = index + step;
    Some(RideProgress {
        route_index: Some(next),
        driver_location: Some(Some(path[next])),
        bearing: Some(Some(bearing_degrees(path[index], path[next]))),
        ..RideProgress::default()
    })
}

/// Moves the vehicle along the trip, accruing distance, fare and duration.
/// The final tick applies the same accrual at the last point and completes
/// the ride.
pub(crate) fn trip_tick(
    ride: &Ride,
    step: usize,
    fares: &FareSchedule,
    now: OffsetDateTime,
) -> Option<RideProgress> {
    let path = ride.route_path.as_ref().filter(|p| !p.is_empty())?;
    let last = path.len() - 1;
    let index = ride.route_index.min(last);
    let finished = index + step >= path.len();

    let next = (index + step).min(last);
    let position = path[next];
    let previous = ride.current_location.unwrap_or(ride.origin);
    let segment_m = distance_meters(previous, position);
    let distance_km = ride.distance_km + segment_m / 1000.0;

    let mut progress = RideProgress {
        route_index: Some(next),
        current_location: Some(Some(position)),
        bearing: Some(Some(bearing_degrees(previous, position))),
        distance_km: Some(distance_km),
        current_fare: Some(fares.fare_for_distance(distance_km)),
        duration_min: Some(ride.duration_min + step as f64 / 60.0),
        ..RideProgress::default()
    };
    if finished {
        progress.status = Some(RideStatus::Completed);
        progress.end_time = Some(Some(now));
    }
    Some(progress)
}
