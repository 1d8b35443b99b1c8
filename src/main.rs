//! Main entry point for the taxi ride simulator.
//! Sets up the HTTP server, configures logging, and initializes the ride
//! service with environment-based configuration.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use taxi_sim::api;
use taxi_sim::config::SimulatorConfig;
use taxi_sim::service::RideService;

/// # Server Configuration
/// - Binds to 0.0.0.0 on PORT (default 8080)
/// - Ride endpoints under /ride, health at /health
///
/// # Environment Variables
/// Simulator timings and pricing can be tuned with TAXI_* variables, for example:
/// - TAXI_SEARCH_DELAY_MS: Time spent searching for a driver (default: 3000)
/// - TAXI_ACCEPT_DELAY_MS: Delay before the driver starts moving (default: 1000)
/// - TAXI_TICK_INTERVAL_MS: Movement tick period (default: 800)
/// - TAXI_BASE_FARE / TAXI_PER_METER_RATE: Fare schedule (default: 1500 / 1)
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Log level can be set via RUST_LOG environment variable
    env_logger::init();

    let config = SimulatorConfig::from_env_or_default();
    log::info!("Starting taxi simulator with configuration: {:?}", config);

    let service = RideService::new(Some(config))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let service = web::Data::new(Arc::new(service));

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("PORT environment variable must be a valid port number: {}", e),
            )
        })?;

    log::info!("Starting server on port {}", port);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(service.clone())
            .configure(api::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
