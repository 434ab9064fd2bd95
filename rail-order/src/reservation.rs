use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use futures_util::try_join;
use serde::Deserialize;
use tracing::{info, warn};

use rail_core::identity::Identity;
use rail_core::repository::{CatalogReader, OrderStore, PassengerDirectory};
use rail_core::{CoreError, CoreResult};
use rail_shared::{NewOrder, NewTicket, Route};

use crate::views::{OrderView, OrderViewBuilder};

/// A request to hold one seat on one route for one departure date.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub route_id: i64,
    pub seat_id: i64,
    /// Minor units. Defaults to the route's base price.
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub passenger_id: Option<i64>,
    /// Defaults to tomorrow (UTC).
    #[serde(default)]
    pub departure_date: Option<NaiveDate>,
}

/// Owns the reserve / inspect / cancel side of the order lifecycle.
pub struct ReservationManager {
    catalog: Arc<dyn CatalogReader>,
    passengers: Arc<dyn PassengerDirectory>,
    orders: Arc<dyn OrderStore>,
    views: OrderViewBuilder,
}

impl ReservationManager {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        passengers: Arc<dyn PassengerDirectory>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        let views = OrderViewBuilder::new(catalog.clone());
        Self { catalog, passengers, orders, views }
    }

    pub async fn reserve(&self, identity: &Identity, request: ReservationRequest) -> CoreResult<OrderView> {
        self.reserve_at(identity, request, Utc::now()).await
    }

    /// Reserve with an explicit clock, used for the default date and the
    /// order's creation timestamp.
    pub async fn reserve_at(
        &self,
        identity: &Identity,
        request: ReservationRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<OrderView> {
        // 1. Route and seat must exist, and the seat must be on the route's train
        let (route, seat) = try_join!(
            self.catalog.get_route(request.route_id),
            self.catalog.get_seat(request.seat_id),
        )?;
        let route = route.ok_or_else(|| CoreError::NotFound(format!("route {}", request.route_id)))?;
        let seat = seat.ok_or_else(|| CoreError::NotFound(format!("seat {}", request.seat_id)))?;

        let carriage = self.catalog.get_carriage(seat.carriage_id).await?;
        if carriage.map(|c| c.train_id) != Some(route.train_id) {
            return Err(CoreError::ValidationError(format!(
                "seat {} is not on the train of route {}",
                seat.id, route.id
            )));
        }

        // 2. Departure date and price
        let departure_date = resolve_departure_date(request.departure_date, now)?;
        let price_minor = resolve_price(request.price, &route)?;
        let passenger_id = self.resolve_passenger(identity, request.passenger_id).await?;

        // 3. Check-and-insert in one store transaction
        let order = self
            .orders
            .create_reserved_order(NewOrder {
                user_id: identity.user_id,
                route_id: Some(route.id),
                created_at: now,
                tickets: vec![NewTicket {
                    seat_id: seat.id,
                    passenger_id,
                    departure_date,
                    price_minor,
                }],
            })
            .await
            .inspect_err(|e| {
                if let CoreError::SeatTaken { seat_id, departure_date } = e {
                    info!(seat_id, %departure_date, user_id = identity.user_id, "Seat already taken");
                }
            })?;

        info!(
            order_id = order.id,
            seat_id = seat.id,
            %departure_date,
            user_id = identity.user_id,
            "Seat reserved"
        );

        // 4. Enrich; the order is committed, so lookup failures fall back to the stored data
        let order_id = order.id;
        match self.views.build(order.clone()).await {
            Ok(view) => Ok(view),
            Err(e) => {
                warn!(order_id, error = %e, "Order stored but enrichment failed");
                Ok(OrderView::unenriched(order))
            }
        }
    }

    /// Explicit passenger ids must exist and belong to the caller; otherwise
    /// the caller's own profile is used when there is one.
    async fn resolve_passenger(&self, identity: &Identity, requested: Option<i64>) -> CoreResult<Option<i64>> {
        match requested {
            Some(id) => {
                let passenger = self
                    .passengers
                    .get_passenger(id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("passenger {}", id)))?;
                if passenger.user_id != identity.user_id {
                    return Err(CoreError::AuthorizationError(format!(
                        "passenger {} does not belong to user {}",
                        id, identity.user_id
                    )));
                }
                Ok(Some(passenger.id))
            }
            None => Ok(self
                .passengers
                .get_passenger_by_user(identity.user_id)
                .await?
                .map(|p| p.id)),
        }
    }

    pub async fn get_order(&self, identity: &Identity, order_id: i64) -> CoreResult<OrderView> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        identity.ensure_owner(&order)?;
        self.views.build(order).await
    }

    pub async fn list_orders(&self, identity: &Identity) -> CoreResult<Vec<OrderView>> {
        let orders = self.orders.list_orders_by_user(identity.user_id).await?;
        self.views.build_all(orders).await
    }

    pub async fn list_all_orders(&self, identity: &Identity) -> CoreResult<Vec<OrderView>> {
        identity.ensure_admin()?;
        let orders = self.orders.list_all_orders().await?;
        self.views.build_all(orders).await
    }

    /// Owner-only, PENDING-only. The seat slots are free once this returns.
    pub async fn cancel_order(&self, identity: &Identity, order_id: i64) -> CoreResult<()> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        identity.ensure_owner(&order)?;

        if !order.is_pending() {
            return Err(CoreError::Conflict(format!(
                "order {} is {} and can no longer be cancelled",
                order_id, order.status
            )));
        }

        if !self.orders.cancel_pending(order_id).await? {
            warn!(order_id, "Order settled while being cancelled");
            return Err(CoreError::Conflict(format!("order {} is no longer pending", order_id)));
        }

        info!(order_id, user_id = identity.user_id, "Order cancelled");
        Ok(())
    }
}

fn resolve_departure_date(requested: Option<NaiveDate>, now: DateTime<Utc>) -> CoreResult<NaiveDate> {
    let today = now.date_naive();
    match requested {
        Some(date) if date < today => Err(CoreError::ValidationError(format!(
            "departure date {} is in the past",
            date
        ))),
        Some(date) => Ok(date),
        None => today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| CoreError::ValidationError("departure date out of range".to_string())),
    }
}

fn resolve_price(requested: Option<i64>, route: &Route) -> CoreResult<i64> {
    match requested {
        Some(price) if price <= 0 => Err(CoreError::ValidationError("price must be positive".to_string())),
        Some(price) => Ok(price),
        None => Ok(route.price_minor),
    }
}
