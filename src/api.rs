//! API endpoints for the ride simulator.
//! Exposes the rider's intents and read access to the live ride. All bodies
//! are JSON.

use actix_web::{get, post, web, HttpResponse, Responder, ResponseError};
use std::sync::Arc;

use crate::models::RideRequest;
use crate::service::RideService;

/// Requests a taxi.
///
/// # Returns
/// - 200 OK with the new ride in SEARCHING
/// - 400 Bad Request if coordinates are invalid
/// - 409 Conflict if a ride is already in progress
#[post("/ride/request")]
pub async fn request_ride(
    request: web::Json<RideRequest>,
    service: web::Data<Arc<RideService>>,
) -> impl Responder {
    match service.request_ride(request.into_inner()) {
        Ok(ride) => HttpResponse::Ok().json(ride),
        Err(e) => e.error_response(),
    }
}

/// Accepts the matched driver.
#[post("/ride/accept")]
pub async fn accept_match(service: web::Data<Arc<RideService>>) -> impl Responder {
    match service.accept_match() {
        Ok(ride) => HttpResponse::Ok().json(ride),
        Err(e) => e.error_response(),
    }
}

/// Cancels the live ride from any status.
///
/// # Returns
/// - 200 OK with the history entry, or null if no driver had been assigned
/// - 404 Not Found if there is no ride
#[post("/ride/cancel")]
pub async fn cancel_ride(service: web::Data<Arc<RideService>>) -> impl Responder {
    match service.cancel_ride() {
        Ok(entry) => HttpResponse::Ok().json(entry),
        Err(e) => e.error_response(),
    }
}

/// Ends the ride at the vehicle's current position.
#[post("/ride/stop")]
pub async fn stop_ride(service: web::Data<Arc<RideService>>) -> impl Responder {
    match service.stop_ride_early() {
        Ok(ride) => HttpResponse::Ok().json(ride),
        Err(e) => e.error_response(),
    }
}

/// Opens the payment step of a completed ride.
#[post("/ride/payment")]
pub async fn open_payment(service: web::Data<Arc<RideService>>) -> impl Responder {
    match service.open_payment() {
        Ok(ride) => HttpResponse::Ok().json(ride),
        Err(e) => e.error_response(),
    }
}

/// Confirms payment, records the ride in the history and resets to idle.
#[post("/ride/confirm")]
pub async fn confirm_payment(service: web::Data<Arc<RideService>>) -> impl Responder {
    match service.confirm_payment() {
        Ok(entry) => HttpResponse::Ok().json(entry),
        Err(e) => e.error_response(),
    }
}

/// Current ride for map markers, fare display and status banners.
#[get("/ride")]
pub async fn current_ride(service: web::Data<Arc<RideService>>) -> impl Responder {
    HttpResponse::Ok().json(service.current_ride())
}

#[get("/ride/history")]
pub async fn history(service: web::Data<Arc<RideService>>) -> impl Responder {
    HttpResponse::Ok().json(service.history())
}

/// Health check endpoint.
#[get("/health")]
pub async fn health(service: web::Data<Arc<RideService>>) -> impl Responder {
    HttpResponse::Ok().json(service.get_health_status())
}

/// Registers every endpoint on an actix app or scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(request_ride)
        .service(accept_match)
        .service(cancel_ride)
        .service(stop_ride)
        .service(open_payment)
        .service(confirm_payment)
        .service(history)
        .service(current_ride)
        .service(health);
}
