pub mod availability;
pub mod expiry;
pub mod payment;
pub mod reservation;
pub mod views;

pub use availability::{SeatAvailability, SeatMap};
pub use expiry::ExpiryReaper;
pub use payment::{MockPaymentGateway, PaymentOrchestrator, PaymentReceipt};
pub use reservation::{ReservationManager, ReservationRequest};
pub use views::{OrderView, OrderViewBuilder, TicketView};
