pub mod models;
pub mod pii;

pub use models::catalog::{Carriage, Passenger, Route, RouteStop, Seat, Station, Train};
pub use models::order::{
    ticket_number, NewOrder, NewTicket, Order, OrderStatus, Ticket, TicketStatus, UnknownStatus,
};
pub use models::seed::{
    CarriageSeed, CatalogSeed, PassengerSeed, RouteSeed, SeedReport, StationSeed, StopSeed,
    TrainSeed,
};
pub use pii::Masked;
