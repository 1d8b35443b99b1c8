use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::models::RideStatus;

#[derive(Error, Debug)]
pub enum RideError {
    #[error("Invalid request data: {0}")]
    ValidationError(String),

    #[error("No active ride")]
    NoActiveRide,

    #[error("A ride is already in progress ({0:?})")]
    RideInProgress(RideStatus),

    #[error("Cannot {action} while ride is {status:?}")]
    InvalidTransition {
        action: &'static str,
        status: RideStatus,
    },

    #[error("Route unavailable: {0}")]
    RouteUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for RideError {
    fn error_response(&self) -> HttpResponse {
        match self {
            RideError::ValidationError(msg) => HttpResponse::BadRequest().json(json!({
                "error": "validation_error",
                "message": msg
            })),
            RideError::NoActiveRide => HttpResponse::NotFound().json(json!({
                "error": "no_active_ride",
                "message": "There is no ride in progress"
            })),
            RideError::RideInProgress(status) => HttpResponse::Conflict().json(json!({
                "error": "ride_in_progress",
                "message": self.to_string(),
                "status": status
            })),
            RideError::InvalidTransition { status, .. } => HttpResponse::Conflict().json(json!({
                "error": "invalid_transition",
                "message": self.to_string(),
                "status": status
            })),
            RideError::RouteUnavailable(msg) => HttpResponse::BadGateway().json(json!({
                "error": "route_unavailable",
                "message": msg
            })),
            RideError::Internal(msg) => {
                log::error!("Internal error: {}", msg);
                HttpResponse::InternalServerError().json(json!({
                    "error": "internal_error",
                    "message": "An internal server error occurred"
                }))
            }
        }
    }
}
