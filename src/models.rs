//! Data models for the taxi ride simulator.
//! Defines the ride record owned by the store, the partial updates the
//! simulator writes through, and the request/response shapes of the HTTP layer.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Geographic location represented by latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and inside the valid ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Driver assigned to a ride when it is matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    pub photo_url: String,
    pub car_model: String,
    pub plate_number: String,
    pub rating: f32,
    pub eta_minutes: u32,
}

/// Lifecycle status of the current ride.
///
/// `Idle` is what the store reports when no ride is live; a stored ride is
/// never in `Idle` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Idle,
    Searching,
    Matched,
    MatchAccepted,
    DriverArriving,
    InRide,
    Completed,
    Paying,
}

impl RideStatus {
    /// Statuses that own a route leg and a tick loop.
    pub fn is_moving(self) -> bool {
        matches!(self, RideStatus::DriverArriving | RideStatus::InRide)
    }
}

/// The single live ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: String,
    pub status: RideStatus,
    pub origin: Coordinate,
    /// Rewritten to the vehicle position when the ride is stopped early
    pub destination: Coordinate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_location: Option<Coordinate>,
    /// Vehicle position from the end of the arrival leg onwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_location: Option<Coordinate>,
    /// Polyline of the active leg, cleared at every leg transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_path: Option<Vec<Coordinate>>,
    pub route_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearing: Option<f64>,
    pub distance_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_fare: Option<u64>,
    pub current_fare: u64,
    pub duration_min: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    pub stopped_early: bool,
}

impl Ride {
    /// Creates a ride in `Searching` with nothing accrued but the base fare.
    pub fn new(origin: Coordinate, destination: Coordinate, base_fare: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: RideStatus::Searching,
            origin,
            destination,
            driver: None,
            driver_location: None,
            current_location: None,
            route_path: None,
            route_index: 0,
            bearing: None,
            distance_km: 0.0,
            estimated_fare: None,
            current_fare: base_fare,
            duration_min: 0.0,
            requested_at: OffsetDateTime::now_utc(),
            end_time: None,
            stopped_early: false,
        }
    }
}

/// Partial update shallow-merged into the live ride.
///
/// Nullable ride fields use `Option<Option<T>>`: the outer `None` leaves the
/// field alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideProgress {
    pub status: Option<RideStatus>,
    pub destination: Option<Coordinate>,
    pub driver: Option<Option<Driver>>,
    pub driver_location: Option<Option<Coordinate>>,
    pub current_location: Option<Option<Coordinate>>,
    pub route_path: Option<Option<Vec<Coordinate>>>,
    pub route_index: Option<usize>,
    pub bearing: Option<Option<f64>>,
    pub distance_km: Option<f64>,
    pub estimated_fare: Option<Option<u64>>,
    pub current_fare: Option<u64>,
    pub duration_min: Option<f64>,
    pub end_time: Option<Option<OffsetDateTime>>,
    pub stopped_early: Option<bool>,
}

impl RideProgress {
    pub fn status(status: RideStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(self, ride: &mut Ride) {
        if let Some(v) = self.status {
            ride.status = v;
        }
        if let Some(v) = self.destination {
            ride.destination = v;
        }
        if let Some(v) = self.driver {
            ride.driver = v;
        }
        if let Some(v) = self.driver_location {
            ride.driver_location = v;
        }
        if let Some(v) = self.current_location {
            ride.current_location = v;
        }
        if let Some(v) = self.route_path {
            ride.route_path = v;
        }
        if let Some(v) = self.route_index {
            ride.route_index = v;
        }
        if let Some(v) = self.bearing {
            ride.bearing = v;
        }
        if let Some(v) = self.distance_km {
            ride.distance_km = v;
        }
        if let Some(v) = self.estimated_fare {
            ride.estimated_fare = v;
        }
        if let Some(v) = self.current_fare {
            ride.current_fare = v;
        }
        if let Some(v) = self.duration_min {
            ride.duration_min = v;
        }
        if let Some(v) = self.end_time {
            ride.end_time = v;
        }
        if let Some(v) = self.stopped_early {
            ride.stopped_early = v;
        }
    }
}

/// How a ride left the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideOutcome {
    Completed,
    StoppedEarly,
    Cancelled,
}

/// Immutable snapshot appended to the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideHistoryEntry {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub fare: u64,
    pub driver_name: Option<String>,
    pub status: RideOutcome,
}

impl RideHistoryEntry {
    pub fn from_ride(ride: &Ride, status: RideOutcome) -> Self {
        Self {
            id: ride.id.clone(),
            date: ride.end_time.unwrap_or_else(OffsetDateTime::now_utc),
            origin: ride.origin,
            destination: ride.destination,
            fare: ride.current_fare,
            driver_name: ride.driver.as_ref().map(|d| d.name.clone()),
            status,
        }
    }
}

/// Body of `POST /ride/request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
}

/// Body of `GET /ride`; `ride` is absent while idle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideView {
    pub status: RideStatus,
    pub ride: Option<Ride>,
}

/// Counters collected from store events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideStats {
    pub completed_count: u64,
    pub cancelled_count: u64,
    pub history_size: usize,
}

/// Response body of the health endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub ride_status: RideStatus,
    pub ride_stats: RideStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_merges_only_present_fields() {
        let mut ride = Ride::new(Coordinate::new(47.9186, 106.917), Coordinate::new(47.92, 106.93), 1500);
        ride.bearing = Some(45.0);

        RideProgress {
            route_index: Some(4),
            bearing: Some(None),
            ..RideProgress::default()
        }
        .apply(&mut ride);

        assert_eq!(ride.route_index, 4);
        assert_eq!(ride.bearing, None);
        assert_eq!(ride.status, RideStatus::Searching);
        assert_eq!(ride.current_fare, 1500);
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&RideStatus::DriverArriving).unwrap();
        assert_eq!(json, "\"DRIVER_ARRIVING\"");
    }

    #[test]
    fn coordinate_validation() {
        assert!(Coordinate::new(47.9, 106.9).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::NAN).is_valid());
    }
}
