use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};

use rail_core::repository::OrderStore;
use rail_core::{CoreError, CoreResult};
use rail_shared::{ticket_number, NewOrder, Order, OrderStatus, Ticket, TicketStatus};

use crate::database::{is_slot_conflict, storage};

pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn tickets_for(&self, order_ids: &[i64]) -> CoreResult<HashMap<i64, Vec<Ticket>>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, order_id, seat_id, passenger_id, departure_date, price_minor, ticket_number, status
            FROM tickets
            WHERE order_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut grouped: HashMap<i64, Vec<Ticket>> = HashMap::new();
        for row in rows {
            let ticket = row.into_ticket()?;
            grouped.entry(ticket.order_id).or_default().push(ticket);
        }
        Ok(grouped)
    }

    async fn transition(&self, id: i64, from: OrderStatus, to: OrderStatus) -> CoreResult<bool> {
        let result = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() == 1)
    }

    async fn with_tickets(&self, rows: Vec<OrderRow>) -> CoreResult<Vec<Order>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut tickets = self.tickets_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let own = tickets.remove(&row.id).unwrap_or_default();
                row.into_order(own)
            })
            .collect()
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    route_id: Option<i64>,
    created_at: DateTime<Utc>,
    status: String,
    total_minor: i64,
}

impl OrderRow {
    fn into_order(self, tickets: Vec<Ticket>) -> CoreResult<Order> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| CoreError::StorageError(e.to_string()))?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            route_id: self.route_id,
            created_at: self.created_at,
            status,
            total_minor: self.total_minor,
            tickets,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i64,
    order_id: i64,
    seat_id: i64,
    passenger_id: Option<i64>,
    departure_date: NaiveDate,
    price_minor: i64,
    ticket_number: String,
    status: String,
}

impl TicketRow {
    fn into_ticket(self) -> CoreResult<Ticket> {
        let status = self
            .status
            .parse::<TicketStatus>()
            .map_err(|e| CoreError::StorageError(e.to_string()))?;
        Ok(Ticket {
            id: self.id,
            order_id: self.order_id,
            seat_id: self.seat_id,
            passenger_id: self.passenger_id,
            departure_date: self.departure_date,
            price_minor: self.price_minor,
            ticket_number: self.ticket_number,
            status,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, route_id, created_at, status, total_minor";

#[async_trait]
impl OrderStore for PostgresOrderRepository {
    async fn create_reserved_order(&self, order: NewOrder) -> CoreResult<Order> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        // 1. Check every slot inside the transaction
        for ticket in &order.tickets {
            let held: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM tickets
                    WHERE seat_id = $1 AND departure_date = $2 AND status = 'ACTIVE'
                )
                "#,
            )
            .bind(ticket.seat_id)
            .bind(ticket.departure_date)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage)?;

            if held {
                return Err(CoreError::SeatTaken {
                    seat_id: ticket.seat_id,
                    departure_date: ticket.departure_date,
                });
            }
        }

        // 2. Insert order
        let total_minor = order.total_minor();
        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, route_id, created_at, status, total_minor)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(order.user_id)
        .bind(order.route_id)
        .bind(order.created_at)
        .bind(OrderStatus::Pending.as_str())
        .bind(total_minor)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        // 3. Insert tickets; the partial unique index catches a concurrent winner
        let mut tickets = Vec::with_capacity(order.tickets.len());
        for new_ticket in &order.tickets {
            let number = ticket_number(order_id, order.created_at);
            let inserted = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO tickets (order_id, seat_id, passenger_id, departure_date, price_minor, ticket_number, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(order_id)
            .bind(new_ticket.seat_id)
            .bind(new_ticket.passenger_id)
            .bind(new_ticket.departure_date)
            .bind(new_ticket.price_minor)
            .bind(&number)
            .bind(TicketStatus::Active.as_str())
            .fetch_one(&mut *tx)
            .await;

            let ticket_id = match inserted {
                Ok(id) => id,
                Err(e) if is_slot_conflict(&e) => {
                    warn!(
                        seat_id = new_ticket.seat_id,
                        departure_date = %new_ticket.departure_date,
                        "slot claimed by a concurrent reservation"
                    );
                    return Err(CoreError::SeatTaken {
                        seat_id: new_ticket.seat_id,
                        departure_date: new_ticket.departure_date,
                    });
                }
                Err(e) => return Err(storage(e)),
            };

            tickets.push(Ticket {
                id: ticket_id,
                order_id,
                seat_id: new_ticket.seat_id,
                passenger_id: new_ticket.passenger_id,
                departure_date: new_ticket.departure_date,
                price_minor: new_ticket.price_minor,
                ticket_number: number,
                status: TicketStatus::Active,
            });
        }

        // 4. Commit; a serialization failure here means another writer won
        if let Err(e) = tx.commit().await {
            if is_slot_conflict(&e) {
                if let Some(first) = order.tickets.first() {
                    return Err(CoreError::SeatTaken {
                        seat_id: first.seat_id,
                        departure_date: first.departure_date,
                    });
                }
            }
            return Err(storage(e));
        }

        debug!(order_id, tickets = tickets.len(), "order stored");

        Ok(Order {
            id: order_id,
            user_id: order.user_id,
            route_id: order.route_id,
            created_at: order.created_at,
            status: OrderStatus::Pending,
            total_minor,
            tickets,
        })
    }

    async fn is_available(&self, seat_id: i64, departure_date: NaiveDate) -> CoreResult<bool> {
        let held: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM tickets
                WHERE seat_id = $1 AND departure_date = $2 AND status = 'ACTIVE'
            )
            "#,
        )
        .bind(seat_id)
        .bind(departure_date)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(!held)
    }

    async fn taken_seats(&self, seat_ids: &[i64], departure_date: NaiveDate) -> CoreResult<Vec<i64>> {
        sqlx::query_scalar(
            r#"
            SELECT seat_id FROM tickets
            WHERE seat_id = ANY($1) AND departure_date = $2 AND status = 'ACTIVE'
            "#,
        )
        .bind(seat_ids)
        .bind(departure_date)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)
    }

    async fn get_order(&self, id: i64) -> CoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        match row {
            Some(row) => Ok(self.with_tickets(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders_by_user(&self, user_id: i64) -> CoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        self.with_tickets(rows).await
    }

    async fn list_all_orders(&self) -> CoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders ORDER BY created_at DESC, id DESC",
            ORDER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        self.with_tickets(rows).await
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
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let updated = sqlx::query("UPDATE orders SET status = 'CANCELLED' WHERE id = $1 AND status = 'PENDING'")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(storage)?;
            return Ok(false);
        }

        sqlx::query("UPDATE tickets SET status = 'CANCELLED' WHERE order_id = $1 AND status = 'ACTIVE'")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(true)
    }

    async fn list_expired_pending(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT id FROM orders WHERE status = 'PENDING' AND created_at < $1 ORDER BY created_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)
    }
}
