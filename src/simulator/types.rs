use crate::models::{Coordinate, Ride, RideStatus};

/// One continuously tracked segment of a ride with its own route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// Driver's position to the pickup
    Arrival,
    /// Pickup to destination
    Trip,
}

impl Leg {
    pub fn for_status(status: RideStatus) -> Option<Self> {
        match status {
            RideStatus::DriverArriving => Some(Leg::Arrival),
            RideStatus::InRide => Some(Leg::Trip),
            _ => None,
        }
    }

    pub fn status(self) -> RideStatus {
        match self {
            Leg::Arrival => RideStatus::DriverArriving,
            Leg::Trip => RideStatus::InRide,
        }
    }

    /// Route endpoints for this leg, `None` while a required field is missing.
    pub fn endpoints(self, ride: &Ride) -> Option<(Coordinate, Coordinate)> {
        match self {
            Leg::Arrival => ride.driver_location.map(|from| (from, ride.origin)),
            Leg::Trip => Some((ride.origin, ride.destination)),
        }
    }
}
