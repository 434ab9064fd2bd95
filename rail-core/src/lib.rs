pub mod identity;
pub mod payment;
pub mod repository;
pub mod search;

use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Seat {seat_id} is no longer available on {departure_date}")]
    SeatTaken {
        seat_id: i64,
        departure_date: NaiveDate,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Access denied: {0}")]
    AuthorizationError(String),
    #[error("Payment failed: {0}")]
    PaymentError(String),
    #[error("Payment provider unavailable: {0}")]
    GatewayError(String),
    #[error("Storage failure: {0}")]
    StorageError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
