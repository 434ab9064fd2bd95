use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, SecondsFormat};
use futures_util::future::try_join_all;
use futures_util::try_join;
use serde::Serialize;

use rail_core::repository::CatalogReader;
use rail_core::CoreResult;
use rail_shared::{Order, OrderStatus, Route, RouteStop, Station, Ticket, TicketStatus};

/// Order as shown to its owner, enriched with catalog data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<NaiveDate>,
    pub created_at: String,
    pub status: OrderStatus,
    pub total_minor: i64,
    pub tickets: Vec<TicketView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    pub id: i64,
    pub ticket_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carriage_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passenger_id: Option<i64>,
    pub departure_date: NaiveDate,
    pub price_minor: i64,
    pub status: TicketStatus,
}

#[derive(Default)]
struct RouteFacts {
    name: Option<String>,
    train_number: Option<String>,
    train_type: Option<String>,
    departure_city: Option<String>,
    arrival_city: Option<String>,
    departure_time: Option<String>,
    arrival_time: Option<String>,
}

impl OrderView {
    /// The stored order without any catalog lookups.
    pub fn unenriched(order: Order) -> Self {
        let tickets = order.tickets.iter().map(|t| TicketView::from_ticket(t, None, None)).collect();
        Self {
            id: order.id,
            user_id: order.user_id,
            route_id: order.route_id,
            route_name: None,
            train_number: None,
            train_type: None,
            departure_city: None,
            arrival_city: None,
            departure_time: None,
            arrival_time: None,
            departure_date: order.tickets.first().map(|t| t.departure_date),
            created_at: order.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            status: order.status,
            total_minor: order.total_minor,
            tickets,
        }
    }
}

impl TicketView {
    fn from_ticket(ticket: &Ticket, seat_number: Option<i32>, carriage_number: Option<i32>) -> Self {
        Self {
            id: ticket.id,
            ticket_number: ticket.ticket_number.clone(),
            seat_number,
            carriage_number,
            passenger_id: ticket.passenger_id,
            departure_date: ticket.departure_date,
            price_minor: ticket.price_minor,
            status: ticket.status,
        }
    }
}

fn hhmm(time: Option<NaiveTime>) -> Option<String> {
    time.map(|t| t.format("%H:%M").to_string())
}

/// Read-only enrichment of stored orders. Missing catalog rows leave the
/// corresponding fields empty instead of failing the request.
pub struct OrderViewBuilder {
    catalog: Arc<dyn CatalogReader>,
}

impl OrderViewBuilder {
    pub fn new(catalog: Arc<dyn CatalogReader>) -> Self {
        Self { catalog }
    }

    pub async fn build(&self, order: Order) -> CoreResult<OrderView> {
        let route_facts = self.facts_for(order.route_id);
        let tickets = try_join_all(order.tickets.iter().map(|t| self.ticket_view(t)));

        let (facts, tickets) = try_join!(route_facts, tickets)?;

        Ok(OrderView {
            id: order.id,
            user_id: order.user_id,
            route_id: order.route_id,
            route_name: facts.name,
            train_number: facts.train_number,
            train_type: facts.train_type,
            departure_city: facts.departure_city,
            arrival_city: facts.arrival_city,
            departure_time: facts.departure_time,
            arrival_time: facts.arrival_time,
            departure_date: order.tickets.first().map(|t| t.departure_date),
            created_at: order.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            status: order.status,
            total_minor: order.total_minor,
            tickets,
        })
    }

    pub async fn build_all(&self, orders: Vec<Order>) -> CoreResult<Vec<OrderView>> {
        try_join_all(orders.into_iter().map(|o| self.build(o))).await
    }

    async fn facts_for(&self, route_id: Option<i64>) -> CoreResult<RouteFacts> {
        let route = match route_id {
            Some(id) => self.catalog.get_route(id).await?,
            None => None,
        };
        match route {
            Some(route) => self.route_facts(route).await,
            None => Ok(RouteFacts::default()),
        }
    }

    async fn route_facts(&self, route: Route) -> CoreResult<RouteFacts> {
        let (train, stops) = try_join!(
            self.catalog.get_train(route.train_id),
            self.catalog.get_route_stops(route.id),
        )?;

        let first = stops.first();
        let last = if stops.len() > 1 { stops.last() } else { None };

        let (origin, destination) = try_join!(self.station_of(first), self.station_of(last))?;

        Ok(RouteFacts {
            name: Some(route.name),
            train_number: train.as_ref().map(|t| t.number.clone()),
            train_type: train.map(|t| t.train_type),
            departure_city: origin.map(|s| s.city),
            arrival_city: destination.map(|s| s.city),
            departure_time: hhmm(first.and_then(|s| s.departure_time)),
            arrival_time: hhmm(last.and_then(|s| s.arrival_time)),
        })
    }

    async fn station_of(&self, stop: Option<&RouteStop>) -> CoreResult<Option<Station>> {
        match stop {
            Some(stop) => self.catalog.get_station(stop.station_id).await,
            None => Ok(None),
        }
    }

    async fn ticket_view(&self, ticket: &Ticket) -> CoreResult<TicketView> {
        let seat = self.catalog.get_seat(ticket.seat_id).await?;
        let carriage = match &seat {
            Some(seat) => self.catalog.get_carriage(seat.carriage_id).await?,
            None => None,
        };

        Ok(TicketView::from_ticket(
            ticket,
            seat.map(|s| s.number),
            carriage.map(|c| c.number),
        ))
    }
}
