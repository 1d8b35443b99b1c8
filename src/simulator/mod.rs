// Ride lifecycle simulator: status timers, route legs and fare accrual
mod motion;
mod sim_core;
mod sim_lifecycle;
mod types;

// Public exports from the simulator module
pub use sim_core::RideSimulator;
pub use types::Leg;
