use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use rail_shared::{
    Carriage, CatalogSeed, NewOrder, Order, Passenger, Route, RouteStop, Seat, SeedReport,
    Station, Train,
};

use crate::CoreResult;

/// Read-only access to trains, seats, stations and schedules.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn get_train(&self, id: i64) -> CoreResult<Option<Train>>;

    async fn get_carriage(&self, id: i64) -> CoreResult<Option<Carriage>>;

    /// Carriages of a train ordered by carriage number.
    async fn get_carriages_by_train(&self, train_id: i64) -> CoreResult<Vec<Carriage>>;

    async fn get_seat(&self, id: i64) -> CoreResult<Option<Seat>>;

    /// Seats of a carriage ordered by seat number.
    async fn get_seats_by_carriage(&self, carriage_id: i64) -> CoreResult<Vec<Seat>>;

    async fn get_station(&self, id: i64) -> CoreResult<Option<Station>>;

    async fn get_route(&self, id: i64) -> CoreResult<Option<Route>>;

    /// Stops of a route ordered by stop order.
    async fn get_route_stops(&self, route_id: i64) -> CoreResult<Vec<RouteStop>>;

    /// Routes stopping in `from_city` before stopping in `to_city`.
    /// Both arguments are already normalised with `search::normalize_city`.
    async fn find_connecting_routes(&self, from_city: &str, to_city: &str) -> CoreResult<Vec<Route>>;

    async fn count_seats_by_train(&self, train_id: i64) -> CoreResult<i64>;
}

/// Writes the bootstrap catalog. Applying the same seed twice is a no-op.
#[async_trait]
pub trait CatalogSeeder: Send + Sync {
    async fn apply_seed(&self, seed: &CatalogSeed) -> CoreResult<SeedReport>;
}

#[async_trait]
pub trait PassengerDirectory: Send + Sync {
    async fn get_passenger(&self, id: i64) -> CoreResult<Option<Passenger>>;

    /// The user's own passenger profile, if any.
    async fn get_passenger_by_user(&self, user_id: i64) -> CoreResult<Option<Passenger>>;
}

/// Orders and tickets. The store is the only holder of seat state.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Checks every (seat, date) slot of `order` and writes the order with its
    /// tickets in one transaction. A slot that is already held yields
    /// `CoreError::SeatTaken`; nothing is written in that case.
    async fn create_reserved_order(&self, order: NewOrder) -> CoreResult<Order>;

    /// True iff no ACTIVE ticket holds the slot.
    async fn is_available(&self, seat_id: i64, departure_date: NaiveDate) -> CoreResult<bool>;

    /// Subset of `seat_ids` held by an ACTIVE ticket on `departure_date`.
    async fn taken_seats(&self, seat_ids: &[i64], departure_date: NaiveDate) -> CoreResult<Vec<i64>>;

    async fn get_order(&self, id: i64) -> CoreResult<Option<Order>>;

    /// Newest first.
    async fn list_orders_by_user(&self, user_id: i64) -> CoreResult<Vec<Order>>;

    /// Newest first.
    async fn list_all_orders(&self) -> CoreResult<Vec<Order>>;

    /// PENDING -> PAYING. Exactly one caller wins the claim; the others get
    /// false and must not charge.
    async fn begin_payment(&self, id: i64) -> CoreResult<bool>;

    /// PAYING -> PENDING after a declined or failed charge.
    async fn release_payment(&self, id: i64) -> CoreResult<bool>;

    /// PAYING -> PAID. Returns false when the order held no payment claim.
    async fn mark_paid(&self, id: i64) -> CoreResult<bool>;

    /// PENDING -> CANCELLED together with its tickets, freeing their slots.
    /// Returns false when the order was missing or no longer pending.
    async fn cancel_pending(&self, id: i64) -> CoreResult<bool>;

    /// Ids of PENDING orders created strictly before `cutoff`, oldest first.
    async fn list_expired_pending(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<i64>>;
}
