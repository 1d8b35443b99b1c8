//! Configuration management for the taxi ride simulator.
//!
//! Configuration is read from environment variables with the TAXI_ prefix,
//! falling back to defaults that reproduce the reference ride timings.
//!
//! # Environment Variables
//! - TAXI_SEARCH_DELAY_MS: Time spent searching before a driver is matched (default: 3000)
//! - TAXI_ACCEPT_DELAY_MS: Delay between accepting a match and the driver setting off (default: 1000)
//! - TAXI_TICK_INTERVAL_MS: Period of the movement tick (default: 800)
//! - TAXI_STEP_SIZE: Route points advanced per tick (default: 2)
//! - TAXI_BASE_FARE: Flag fall in currency units (default: 1500)
//! - TAXI_PER_METER_RATE: Currency units per meter driven (default: 1.0)
//! - TAXI_AUTO_ACCEPT_DELAY_MS: Accept matches automatically after this delay, 0 disables (default: 0)
//! - TAXI_ROUTE_FETCH_ATTEMPTS: Route fetch attempts before falling back to a straight line (default: 2)
//! - TAXI_FALLBACK_ROUTE_POINTS: Points in the straight-line fallback route (default: 20)
//! - TAXI_ROUTE_SPACING_METERS: Point spacing of the mock route provider (default: 50)
//! - TAXI_ROUTE_LATENCY_MS: Artificial latency of the mock route provider (default: 300)
//! - TAXI_DRIVER_OFFSET_DEGREES: How far from the pickup mock drivers start (default: 0.005)
//! - TAXI_DRIVER_SEED: Seed for mock driver selection; random when unset

use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::pricing::FareSchedule;

/// Prefix for all simulator environment variables.
const ENV_PREFIX: &str = "TAXI_";

/// Timing, pricing and mock-collaborator parameters of the simulator.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    /// How long a ride stays in SEARCHING before a driver is assigned.
    pub search_delay_ms: u64,

    /// Delay between MATCH_ACCEPTED and DRIVER_ARRIVING.
    pub accept_delay_ms: u64,

    /// Period of the movement tick during DRIVER_ARRIVING and IN_RIDE.
    pub tick_interval_ms: u64,

    /// Number of route points advanced per tick.
    pub step_size: usize,

    /// Base fare in currency units.
    pub base_fare: f64,

    /// Currency units charged per meter driven.
    pub per_meter_rate: f64,

    /// Accept a match automatically after this many milliseconds. 0 waits for the rider.
    pub auto_accept_delay_ms: u64,

    /// Total route fetch attempts per leg before the straight-line fallback.
    pub route_fetch_attempts: u32,

    /// Number of points in the straight-line fallback route.
    pub fallback_route_points: usize,

    /// Distance between consecutive points of mock routes.
    pub route_spacing_meters: f64,

    /// Artificial latency of the mock route provider.
    pub route_latency_ms: u64,

    /// Offset of a freshly matched driver from the pickup, in degrees.
    pub driver_offset_degrees: f64,

    /// Seed for mock driver selection and placement.
    pub driver_seed: Option<u64>,
}

impl SimulatorConfig {
    /// Attempts to load configuration from environment variables.
    ///
    /// Variables are prefixed with "TAXI_", e.g. `TAXI_TICK_INTERVAL_MS=400`.
    /// Unset variables keep their defaults.
    ///
    /// # Returns
    /// - Ok(config) if every present variable parses and the result validates
    /// - Err(message) otherwise
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists for local development
        dotenv::dotenv().ok();

        let env_vars: std::collections::HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .map(|(k, v)| (k.trim_start_matches(ENV_PREFIX).to_string(), v))
            .collect();

        match envy::from_iter::<_, Self>(env_vars) {
            Ok(config) => {
                config.validate()?;
                Ok(config)
            }
            Err(e) => Err(format!("Failed to parse environment variables: {}", e)),
        }
    }

    /// Loads configuration from environment variables, falling back to defaults
    /// if they are invalid.
    pub fn from_env_or_default() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            log::warn!("Using default simulator configuration: {}", e);
            Self::default()
        })
    }

    /// Validates all parameters.
    ///
    /// # Returns
    /// - Ok(()) if all validation passes
    /// - Err(message) with description of the first validation failure
    pub fn validate(&self) -> Result<(), String> {
        if self.search_delay_ms == 0 {
            return Err("search_delay_ms must be positive".to_string());
        }
        if self.accept_delay_ms == 0 {
            return Err("accept_delay_ms must be positive".to_string());
        }
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be positive".to_string());
        }
        if self.step_size == 0 {
            return Err("step_size must be positive".to_string());
        }
        if !self.base_fare.is_finite() || self.base_fare < 0.0 {
            return Err("base_fare must be non-negative".to_string());
        }
        if !self.per_meter_rate.is_finite() || self.per_meter_rate < 0.0 {
            return Err("per_meter_rate must be non-negative".to_string());
        }
        if self.route_fetch_attempts == 0 {
            return Err("route_fetch_attempts must be positive".to_string());
        }
        if self.fallback_route_points < 2 {
            return Err("fallback_route_points must be at least 2".to_string());
        }
        if !(self.route_spacing_meters > 0.0) {
            return Err("route_spacing_meters must be positive".to_string());
        }
        if !self.driver_offset_degrees.is_finite() || self.driver_offset_degrees < 0.0 {
            return Err("driver_offset_degrees must be non-negative".to_string());
        }
        Ok(())
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }

    pub fn accept_delay(&self) -> Duration {
        Duration::from_millis(self.accept_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// `None` when matches wait for the rider.
    pub fn auto_accept_delay(&self) -> Option<Duration> {
        (self.auto_accept_delay_ms > 0).then(|| Duration::from_millis(self.auto_accept_delay_ms))
    }

    pub fn route_latency(&self) -> Duration {
        Duration::from_millis(self.route_latency_ms)
    }

    pub fn fare_schedule(&self) -> FareSchedule {
        FareSchedule {
            base_fare: self.base_fare,
            per_meter_rate: self.per_meter_rate,
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            search_delay_ms: 3000,
            accept_delay_ms: 1000,
            tick_interval_ms: 800,
            step_size: 2,
            base_fare: 1500.0,
            per_meter_rate: 1.0,
            auto_accept_delay_ms: 0,
            route_fetch_attempts: 2,
            fallback_route_points: 20,
            route_spacing_meters: 50.0,
            route_latency_ms: 300,
            driver_offset_degrees: 0.005,
            driver_seed: None,
        }
    }
}
