use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order status in the lifecycle. `Paying` marks an order whose charge is
/// in flight; only one payment attempt can hold it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paying,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paying => "PAYING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAYING" => Ok(OrderStatus::Paying),
            "PAID" => Ok(OrderStatus::Paid),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Ticket status. Only `Active` tickets occupy a seat slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Active,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "ACTIVE",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(TicketStatus::Active),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// A group of tickets bought together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub route_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_minor: i64,
    pub tickets: Vec<Ticket>,
}

impl Order {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub order_id: i64,
    pub seat_id: i64,
    pub passenger_id: Option<i64>,
    pub departure_date: NaiveDate,
    pub price_minor: i64,
    pub ticket_number: String,
    pub status: TicketStatus,
}

/// Ticket data supplied at reservation time, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub seat_id: i64,
    pub passenger_id: Option<i64>,
    pub departure_date: NaiveDate,
    pub price_minor: i64,
}

/// An order to be written together with its tickets in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: i64,
    pub route_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<NewTicket>,
}

impl NewOrder {
    pub fn total_minor(&self) -> i64 {
        self.tickets.iter().map(|t| t.price_minor).sum()
    }
}

/// Human-readable ticket number: `TK-{order}-{unix seconds}-{random}`.
pub fn ticket_number(order_id: i64, issued_at: DateTime<Utc>) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "TK-{}-{}-{}",
        order_id,
        issued_at.timestamp(),
        nonce[..6].to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_strings() {
        for status in [OrderStatus::Pending, OrderStatus::Paying, OrderStatus::Paid, OrderStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("REFUNDED".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_string(&TicketStatus::Active).unwrap(), "\"ACTIVE\"");
    }

    #[test]
    fn test_ticket_numbers_are_unique_within_a_second() {
        let now = Utc::now();
        let a = ticket_number(42, now);
        let b = ticket_number(42, now);
        assert!(a.starts_with(&format!("TK-42-{}-", now.timestamp())));
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_order_total() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let order = NewOrder {
            user_id: 1,
            route_id: Some(1),
            created_at: Utc::now(),
            tickets: vec![
                NewTicket { seat_id: 1, passenger_id: None, departure_date: date, price_minor: 2800 },
                NewTicket { seat_id: 2, passenger_id: None, departure_date: date, price_minor: 2300 },
            ],
        };
        assert_eq!(order.total_minor(), 5100);
    }
}
