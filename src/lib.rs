//! Taxi ride lifecycle simulator.
//!
//! Models a taxi request from search through matching, driver arrival,
//! in-ride tracking, fare accrual and completion, driven purely by timers and
//! interpolation along mock routes.

pub mod api;       // HTTP endpoint handlers
pub mod clock;     // Timer scheduling (tokio and virtual time)
pub mod config;    // Configuration management
pub mod drivers;   // Driver registry
pub mod error;     // Error types and handling
pub mod geo;       // Distance and bearing
pub mod models;    // Data structures and types
pub mod pricing;   // Fare calculation
pub mod route;     // Route providers
pub mod service;   // Store + simulator wiring for the HTTP layer
pub mod simulator; // Ride lifecycle state machine
pub mod store;     // Ride state store
