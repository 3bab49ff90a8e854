//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout both
//! services. It centralizes error management, providing a consistent way to
//! handle and represent the error taxonomy of the system: authentication
//! rejections, missing resources, registration conflicts, backing-store
//! unavailability, and internal failures.
//!
//! `AppError` implements `actix_web::error::ResponseError` to seamlessly
//! convert application errors into HTTP responses with JSON bodies. `From`
//! implementations for `sqlx::Error`, `redis::RedisError`,
//! `validator::ValidationErrors`, and `bcrypt::BcryptError` allow
//! propagation with the `?` operator.
//!
//! Authentication and not-found rejections deliberately carry a fixed,
//! minimal body: the variant's message is for server-side logs only and is
//! never shown to the client.

use actix_web::{error::ResponseError, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Missing, expired, or malformed session/token, or bad credentials
    /// (HTTP 401). Clients always see the same body regardless of cause.
    Unauthorized(String),
    /// A client-side error due to a malformed or invalid request (HTTP 400).
    BadRequest(String),
    /// Mutation or lookup target absent, or not owned by the caller
    /// (HTTP 404). The two cases are not distinguished.
    NotFound(String),
    /// Duplicate username or email at registration (HTTP 409).
    Conflict(String),
    /// Failed input validation (HTTP 422 Unprocessable Entity).
    ValidationError(String),
    /// A backing store (Postgres, Redis) is unreachable (HTTP 503).
    Unavailable(String),
    /// An error originating from database operations (HTTP 500).
    DatabaseError(String),
    /// Any other unexpected server-side error (HTTP 500).
    InternalServerError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
///
/// Responses carry a stable status and minimal detail. Internal error text
/// (database messages, store errors) goes to the log, not the client.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Unauthorized(msg) => {
                log::debug!("rejecting request as unauthorized: {}", msg);
                HttpResponse::Unauthorized().json(json!({
                    "error": "unauthorized"
                }))
            }
            AppError::BadRequest(msg) => HttpResponse::BadRequest().json(json!({
                "error": msg
            })),
            AppError::NotFound(msg) => {
                log::debug!("rejecting request as not found: {}", msg);
                HttpResponse::NotFound().json(json!({
                    "error": "not found"
                }))
            }
            AppError::Conflict(msg) => HttpResponse::Conflict().json(json!({
                "error": msg
            })),
            AppError::ValidationError(msg) => HttpResponse::UnprocessableEntity().json(json!({
                "error": msg
            })),
            AppError::Unavailable(msg) => {
                log::error!("backing service unavailable: {}", msg);
                HttpResponse::ServiceUnavailable().json(json!({
                    "error": "service unavailable"
                }))
            }
            AppError::DatabaseError(msg) | AppError::InternalServerError(msg) => {
                log::error!("internal error: {}", msg);
                HttpResponse::InternalServerError().json(json!({
                    "error": "internal server error"
                }))
            }
        }
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` maps to `NotFound`, connectivity failures to `Unavailable`,
/// a unique-constraint violation (SQLSTATE 23505) to `Conflict`, and
/// everything else to `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match &error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => AppError::Unavailable(error.to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                AppError::Conflict("already exists".into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Converts `redis::RedisError` into `AppError::Unavailable`.
///
/// The shared store is a hard dependency for session resolution and the
/// listing cache; any failure to reach it is a 503.
impl From<redis::RedisError> for AppError {
    fn from(error: redis::RedisError) -> AppError {
        AppError::Unavailable(format!("redis: {}", error))
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::InternalServerError`.
///
/// This handles errors during password hashing or verification.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_responses() {
        let error = AppError::Unauthorized("Invalid token".into());
        let response = error.error_response();
        assert_eq!(response.status(), 401);

        let error = AppError::BadRequest("Invalid input".into());
        let response = error.error_response();
        assert_eq!(response.status(), 400);

        let error = AppError::NotFound("Resource not found".into());
        let response = error.error_response();
        assert_eq!(response.status(), 404);

        let error = AppError::Conflict("already exists".into());
        let response = error.error_response();
        assert_eq!(response.status(), 409);

        let error = AppError::Unavailable("redis: connection refused".into());
        let response = error.error_response();
        assert_eq!(response.status(), 503);

        let error = AppError::InternalServerError("Server error".into());
        let response = error.error_response();
        assert_eq!(response.status(), 500);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        match err {
            AppError::NotFound(_) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
