use serde::{Deserialize, Serialize};
use std::str::FromStr;

use rail_shared::Order;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Passenger,
    Admin,
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASSENGER" => Ok(Role::Passenger),
            "ADMIN" => Ok(Role::Admin),
            other => Err(CoreError::AuthorizationError(format!("unknown role {}", other))),
        }
    }
}

/// Authenticated caller, supplied per request by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn passenger(user_id: i64) -> Self {
        Self { user_id, role: Role::Passenger }
    }

    pub fn admin(user_id: i64) -> Self {
        Self { user_id, role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Orders are only visible to and mutable by their owner. A missing order
    /// is reported separately as `NotFound` by the caller.
    pub fn ensure_owner(&self, order: &Order) -> CoreResult<()> {
        if order.is_owned_by(self.user_id) {
            Ok(())
        } else {
            Err(CoreError::AuthorizationError(format!(
                "order {} does not belong to user {}",
                order.id, self.user_id
            )))
        }
    }

    pub fn ensure_admin(&self) -> CoreResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoreError::AuthorizationError("admin role required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rail_shared::OrderStatus;

    fn order_of(user_id: i64) -> Order {
        Order {
            id: 10,
            user_id,
            route_id: None,
            created_at: Utc::now(),
            status: OrderStatus::Pending,
            total_minor: 0,
            tickets: vec![],
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" PASSENGER ".parse::<Role>().unwrap(), Role::Passenger);
        assert!("GUEST".parse::<Role>().is_err());
    }

    #[test]
    fn test_ownership_mismatch_is_access_denied() {
        let identity = Identity::passenger(1);
        assert!(identity.ensure_owner(&order_of(1)).is_ok());
        assert!(matches!(
            identity.ensure_owner(&order_of(2)),
            Err(CoreError::AuthorizationError(_))
        ));
    }

    #[test]
    fn test_admin_does_not_bypass_ownership() {
        let admin = Identity::admin(99);
        assert!(admin.ensure_admin().is_ok());
        assert!(admin.ensure_owner(&order_of(1)).is_err());
        assert!(Identity::passenger(1).ensure_admin().is_err());
    }
}
