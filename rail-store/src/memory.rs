use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use rail_core::repository::{CatalogReader, CatalogSeeder, OrderStore, PassengerDirectory};
use rail_core::search::normalize_city;
use rail_core::{CoreError, CoreResult};
use rail_shared::{
    ticket_number, Carriage, CatalogSeed, Masked, NewOrder, Order, OrderStatus, Passenger, Route,
    RouteStop, Seat, SeedReport, Station, Ticket, TicketStatus, Train,
};

/// In-process store with the same guarantees as the PostgreSQL one: every
/// write runs under a single write lock, and `active_slots` plays the role of
/// the partial unique index on (seat, departure date) for ACTIVE tickets.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    trains: BTreeMap<i64, Train>,
    carriages: BTreeMap<i64, Carriage>,
    seats: BTreeMap<i64, Seat>,
    stations: BTreeMap<i64, Station>,
    routes: BTreeMap<i64, Route>,
    stops: Vec<RouteStop>,
    passengers: BTreeMap<i64, Passenger>,
    orders: BTreeMap<i64, Order>,
    active_slots: HashMap<(i64, NaiveDate), i64>,
    sequences: HashMap<&'static str, i64>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.sequences.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn train_by_number(&self, number: &str) -> Option<i64> {
        self.trains.values().find(|t| t.number == number).map(|t| t.id)
    }

    fn station_by_name(&self, name: &str) -> Option<i64> {
        self.stations.values().find(|s| s.name == name).map(|s| s.id)
    }

    fn stops_of(&self, route_id: i64) -> Vec<RouteStop> {
        let mut stops: Vec<RouteStop> = self
            .stops
            .iter()
            .filter(|s| s.route_id == route_id)
            .cloned()
            .collect();
        stops.sort_by_key(|s| s.stop_order);
        stops
    }

    fn city_of(&self, station_id: i64) -> Option<String> {
        self.stations.get(&station_id).map(|s| normalize_city(&s.city))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with `seed`.
    pub async fn with_seed(seed: &CatalogSeed) -> CoreResult<Self> {
        let store = Self::new();
        store.apply_seed(seed).await?;
        Ok(store)
    }

    /// Conditional status change, the in-memory `UPDATE ... WHERE status = $from`.
    async fn transition(&self, id: i64, from: OrderStatus, to: OrderStatus) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        orders
    }
}

#[async_trait]
impl CatalogReader for MemoryStore {
    async fn get_train(&self, id: i64) -> CoreResult<Option<Train>> {
        Ok(self.tables.read().await.trains.get(&id).cloned())
    }

    async fn get_carriage(&self, id: i64) -> CoreResult<Option<Carriage>> {
        Ok(self.tables.read().await.carriages.get(&id).cloned())
    }

    async fn get_carriages_by_train(&self, train_id: i64) -> CoreResult<Vec<Carriage>> {
        let tables = self.tables.read().await;
        let mut carriages: Vec<Carriage> = tables
            .carriages
            .values()
            .filter(|c| c.train_id == train_id)
            .cloned()
            .collect();
        carriages.sort_by_key(|c| c.number);
        Ok(carriages)
    }

    async fn get_seat(&self, id: i64) -> CoreResult<Option<Seat>> {
        Ok(self.tables.read().await.seats.get(&id).cloned())
    }

    async fn get_seats_by_carriage(&self, carriage_id: i64) -> CoreResult<Vec<Seat>> {
        let tables = self.tables.read().await;
        let mut seats: Vec<Seat> = tables
            .seats
            .values()
            .filter(|s| s.carriage_id == carriage_id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.number);
        Ok(seats)
    }

    async fn get_station(&self, id: i64) -> CoreResult<Option<Station>> {
        Ok(self.tables.read().await.stations.get(&id).cloned())
    }

    async fn get_route(&self, id: i64) -> CoreResult<Option<Route>> {
        Ok(self.tables.read().await.routes.get(&id).cloned())
    }

    async fn get_route_stops(&self, route_id: i64) -> CoreResult<Vec<RouteStop>> {
        Ok(self.tables.read().await.stops_of(route_id))
    }

    async fn find_connecting_routes(&self, from_city: &str, to_city: &str) -> CoreResult<Vec<Route>> {
        let tables = self.tables.read().await;

        let routes = tables
            .routes
            .values()
            .filter(|route| {
                let stops = tables.stops_of(route.id);
                let first_from = stops
                    .iter()
                    .filter(|s| tables.city_of(s.station_id).as_deref() == Some(from_city))
                    .map(|s| s.stop_order)
                    .min();
                let last_to = stops
                    .iter()
                    .filter(|s| tables.city_of(s.station_id).as_deref() == Some(to_city))
                    .map(|s| s.stop_order)
                    .max();
                matches!((first_from, last_to), (Some(o1), Some(o2)) if o1 < o2)
            })
            .cloned()
            .collect();

        Ok(routes)
    }

    async fn count_seats_by_train(&self, train_id: i64) -> CoreResult<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .seats
            .values()
            .filter(|seat| {
                tables
                    .carriages
                    .get(&seat.carriage_id)
                    .is_some_and(|c| c.train_id == train_id)
            })
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl CatalogSeeder for MemoryStore {
    async fn apply_seed(&self, seed: &CatalogSeed) -> CoreResult<SeedReport> {
        let mut tables = self.tables.write().await;
        let mut report = SeedReport::default();

        for train_seed in &seed.trains {
            let train_id = match tables.train_by_number(&train_seed.number) {
                Some(id) => id,
                None => {
                    let id = tables.next_id("trains");
                    tables.trains.insert(id, Train {
                        id,
                        number: train_seed.number.clone(),
                        train_type: train_seed.train_type.clone(),
                    });
                    report.trains += 1;
                    id
                }
            };

            for carriage_seed in &train_seed.carriages {
                let existing = tables
                    .carriages
                    .values()
                    .find(|c| c.train_id == train_id && c.number == carriage_seed.number)
                    .map(|c| c.id);
                if existing.is_some() {
                    continue;
                }

                let carriage_id = tables.next_id("carriages");
                tables.carriages.insert(carriage_id, Carriage {
                    id: carriage_id,
                    train_id,
                    number: carriage_seed.number,
                    carriage_type: carriage_seed.carriage_type.clone(),
                });
                report.carriages += 1;

                for number in 1..=carriage_seed.seat_count {
                    let seat_id = tables.next_id("seats");
                    tables.seats.insert(seat_id, Seat { id: seat_id, carriage_id, number });
                    report.seats += 1;
                }
            }
        }

        for station_seed in &seed.stations {
            if tables.station_by_name(&station_seed.name).is_none() {
                let id = tables.next_id("stations");
                tables.stations.insert(id, Station {
                    id,
                    name: station_seed.name.clone(),
                    city: station_seed.city.clone(),
                });
                report.stations += 1;
            }
        }

        for route_seed in &seed.routes {
            let train_id = tables.train_by_number(&route_seed.train_number).ok_or_else(|| {
                CoreError::ValidationError(format!("unknown train {}", route_seed.train_number))
            })?;

            let existing = tables
                .routes
                .values_mut()
                .find(|r| r.name == route_seed.name && r.train_id == train_id);
            let route_id = match existing {
                Some(route) => {
                    route.price_minor = route_seed.price_minor;
                    route.id
                }
                None => {
                    let id = tables.next_id("routes");
                    tables.routes.insert(id, Route {
                        id,
                        name: route_seed.name.clone(),
                        train_id,
                        price_minor: route_seed.price_minor,
                    });
                    report.routes += 1;
                    id
                }
            };

            for stop_seed in &route_seed.stops {
                let station_id = tables.station_by_name(&stop_seed.station_name).ok_or_else(|| {
                    CoreError::ValidationError(format!("unknown station {}", stop_seed.station_name))
                })?;
                let taken = tables.stops.iter().any(|s| {
                    s.route_id == route_id
                        && (s.station_id == station_id || s.stop_order == stop_seed.stop_order)
                });
                if !taken {
                    tables.stops.push(RouteStop {
                        route_id,
                        station_id,
                        stop_order: stop_seed.stop_order,
                        arrival_time: stop_seed.arrival_time,
                        departure_time: stop_seed.departure_time,
                    });
                    report.stops += 1;
                }
            }
        }

        for passenger_seed in &seed.passengers {
            let exists = tables.passengers.values().any(|p| {
                p.user_id == passenger_seed.user_id
                    && p.first_name == passenger_seed.first_name
                    && p.last_name == passenger_seed.last_name
            });
            if !exists {
                let id = tables.next_id("passengers");
                tables.passengers.insert(id, Passenger {
                    id,
                    user_id: passenger_seed.user_id,
                    first_name: passenger_seed.first_name.clone(),
                    last_name: passenger_seed.last_name.clone(),
                    passport_data: passenger_seed.passport_data.clone().map(Masked::new),
                });
                report.passengers += 1;
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl PassengerDirectory for MemoryStore {
    async fn get_passenger(&self, id: i64) -> CoreResult<Option<Passenger>> {
        Ok(self.tables.read().await.passengers.get(&id).cloned())
    }

    async fn get_passenger_by_user(&self, user_id: i64) -> CoreResult<Option<Passenger>> {
        let tables = self.tables.read().await;
        Ok(tables.passengers.values().find(|p| p.user_id == user_id).cloned())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_reserved_order(&self, order: NewOrder) -> CoreResult<Order> {
        let mut tables = self.tables.write().await;

        for ticket in &order.tickets {
            if !tables.seats.contains_key(&ticket.seat_id) {
                return Err(CoreError::NotFound(format!("seat {}", ticket.seat_id)));
            }
            if tables.active_slots.contains_key(&(ticket.seat_id, ticket.departure_date)) {
                return Err(CoreError::SeatTaken {
                    seat_id: ticket.seat_id,
                    departure_date: ticket.departure_date,
                });
            }
        }

        // Two tickets of the same order on one slot would violate the index too.
        let mut claimed = std::collections::HashSet::new();
        for ticket in &order.tickets {
            if !claimed.insert((ticket.seat_id, ticket.departure_date)) {
                return Err(CoreError::SeatTaken {
                    seat_id: ticket.seat_id,
                    departure_date: ticket.departure_date,
                });
            }
        }

        let order_id = tables.next_id("orders");
        let total_minor = order.total_minor();
        let mut tickets = Vec::with_capacity(order.tickets.len());
        for new_ticket in order.tickets {
            let ticket_id = tables.next_id("tickets");
            tables
                .active_slots
                .insert((new_ticket.seat_id, new_ticket.departure_date), ticket_id);
            tickets.push(Ticket {
                id: ticket_id,
                order_id,
                seat_id: new_ticket.seat_id,
                passenger_id: new_ticket.passenger_id,
                departure_date: new_ticket.departure_date,
                price_minor: new_ticket.price_minor,
                ticket_number: ticket_number(order_id, order.created_at),
                status: TicketStatus::Active,
            });
        }

        let stored = Order {
            id: order_id,
            user_id: order.user_id,
            route_id: order.route_id,
            created_at: order.created_at,
            status: OrderStatus::Pending,
            total_minor,
            tickets,
        };
        tables.orders.insert(order_id, stored.clone());
        debug!(order_id, "order stored");

        Ok(stored)
    }

    async fn is_available(&self, seat_id: i64, departure_date: NaiveDate) -> CoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(!tables.active_slots.contains_key(&(seat_id, departure_date)))
    }

    async fn taken_seats(&self, seat_ids: &[i64], departure_date: NaiveDate) -> CoreResult<Vec<i64>> {
        let tables = self.tables.read().await;
        Ok(seat_ids
            .iter()
            .copied()
            .filter(|id| tables.active_slots.contains_key(&(*id, departure_date)))
            .collect())
    }

    async fn get_order(&self, id: i64) -> CoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders_by_user(&self, user_id: i64) -> CoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let orders = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(orders))
    }

    async fn list_all_orders(&self) -> CoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(Self::newest_first(tables.orders.values().cloned().collect()))
    }

    async fn begin_payment(&self, id: i64) -> CoreResult<bool> {
        self.transition(id, OrderStatus::Pending, OrderStatus::Paying).await
    }

    async fn release_payment(&self, id: i64) -> CoreResult<bool> {
        self.transition(id, OrderStatus::Paying, OrderStatus::Pending).await
    }

    async fn mark_paid(&self, id: i64) -> CoreResult<bool> {
        self.transition(id, OrderStatus::Paying, OrderStatus::Paid).await
    }

    async fn cancel_pending(&self, id: i64) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Tables { orders, active_slots, .. } = &mut *tables;

        let Some(order) = orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.status != OrderStatus::Pending {
            return Ok(false);
        }

        order.status = OrderStatus::Cancelled;
        for ticket in order.tickets.iter_mut() {
            if ticket.status == TicketStatus::Active {
                ticket.status = TicketStatus::Cancelled;
                active_slots.remove(&(ticket.seat_id, ticket.departure_date));
            }
        }
        Ok(true)
    }

    async fn list_expired_pending(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<i64>> {
        let tables = self.tables.read().await;
        let mut expired: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < cutoff)
            .collect();
        expired.sort_by_key(|o| o.created_at);
        Ok(expired.into_iter().map(|o| o.id).collect())
    }
}
