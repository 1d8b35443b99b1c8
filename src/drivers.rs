//! Driver registry used when a search turns into a match.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geo::distance_meters;
use crate::models::{Coordinate, Driver};

/// Average city speed used to quote a driver's ETA.
const ETA_SPEED_KMH: f64 = 30.0;

/// A driver together with where they start the arrival leg.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverAssignment {
    pub driver: Driver,
    pub location: Coordinate,
}

/// Source of drivers for matched rides.
pub trait DriverRegistry: Send + Sync + 'static {
    fn assign(&self, pickup: Coordinate) -> DriverAssignment;
}

/// Fixed roster; the driver and the starting direction are drawn from a
/// seedable RNG, the starting distance is fixed.
pub struct MockDriverRegistry {
    roster: Vec<Driver>,
    offset_degrees: f64,
    rng: Mutex<StdRng>,
}

impl MockDriverRegistry {
    pub fn new(roster: Vec<Driver>, offset_degrees: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let roster = if roster.is_empty() { default_roster() } else { roster };
        Self {
            roster,
            offset_degrees,
            rng: Mutex::new(rng),
        }
    }

    pub fn with_defaults(offset_degrees: f64, seed: Option<u64>) -> Self {
        Self::new(default_roster(), offset_degrees, seed)
    }
}

impl DriverRegistry for MockDriverRegistry {
    fn assign(&self, pickup: Coordinate) -> DriverAssignment {
        let (index, angle) = {
            let mut rng = self.rng.lock();
            (
                rng.gen_range(0..self.roster.len()),
                rng.gen_range(0.0..std::f64::consts::TAU),
            )
        };
        let location = Coordinate::new(
            pickup.lat + self.offset_degrees * angle.sin(),
            pickup.lng + self.offset_degrees * angle.cos(),
        );
        let km = distance_meters(location, pickup) / 1000.0;
        let mut driver = self.roster[index].clone();
        driver.eta_minutes = ((km / ETA_SPEED_KMH) * 60.0).ceil().max(1.0) as u32;
        DriverAssignment { driver, location }
    }
}

fn driver(name: &str, photo: &str, car_model: &str, plate_number: &str, rating: f32) -> Driver {
    Driver {
        name: name.to_string(),
        photo_url: format!("https://randomuser.me/api/portraits/{}.jpg", photo),
        car_model: car_model.to_string(),
        plate_number: plate_number.to_string(),
        rating,
        eta_minutes: 0,
    }
}

pub fn default_roster() -> Vec<Driver> {
    vec![
        driver("Bat-Erdene", "men/32", "Toyota Prius", "2451 УБА", 4.8),
        driver("Tsetsegmaa", "women/44", "Hyundai Sonata", "7730 УНЕ", 4.9),
        driver("Ganbold", "men/12", "Toyota Aqua", "0915 УАМ", 4.6),
        driver("Oyunchimeg", "women/68", "Kia K5", "3382 УБН", 4.7),
    ]
}
