//! Fare calculation.
//!
//! The fare is always recomputed from the cumulative distance, never
//! incremented on its own, so it stays a pure function of `distance_km`.

use crate::geo::distance_meters;
use crate::models::Coordinate;

/// Base fare plus a per-meter rate, in integer currency units after flooring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareSchedule {
    pub base_fare: f64,
    pub per_meter_rate: f64,
}

impl Default for FareSchedule {
    fn default() -> Self {
        Self {
            base_fare: 1500.0,
            per_meter_rate: 1.0,
        }
    }
}

impl FareSchedule {
    /// `floor(base_fare + distance_km * 1000 * per_meter_rate)`
    pub fn fare_for_distance(&self, distance_km: f64) -> u64 {
        (self.base_fare + distance_km * 1000.0 * self.per_meter_rate).floor() as u64
    }

    pub fn base(&self) -> u64 {
        self.fare_for_distance(0.0)
    }

    /// Quote shown once a driver is matched, from the straight-line trip length.
    pub fn estimate(&self, origin: Coordinate, destination: Coordinate) -> u64 {
        self.fare_for_distance(distance_meters(origin, destination) / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fare_includes_base_and_distance() {
        let schedule = FareSchedule::default();
        assert_eq!(schedule.base(), 1500);
        assert_eq!(schedule.fare_for_distance(1.0), 2500);
        assert_eq!(schedule.fare_for_distance(0.2345), 1734);
    }

    #[test]
    fn estimate_is_at_least_base_fare() {
        let schedule = FareSchedule::default();
        let origin = Coordinate::new(47.9186, 106.9170);
        let destination = Coordinate::new(47.92, 106.93);

        let estimate = schedule.estimate(origin, destination);
        assert!(estimate > schedule.base());
        assert_eq!(schedule.estimate(origin, origin), schedule.base());
    }
}
