pub mod auth;
pub mod resiliency;

pub use auth::{admin_auth_middleware, passenger_auth_middleware, Claims};
pub use resiliency::{circuit_breaker_middleware, CircuitBreaker, ResiliencyState};
