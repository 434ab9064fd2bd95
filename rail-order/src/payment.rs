use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use rail_core::identity::Identity;
use rail_core::payment::{CardDetails, ChargeRequest, PaymentGateway, PaymentOutcome};
use rail_core::repository::OrderStore;
use rail_core::{CoreError, CoreResult};
use rail_shared::OrderStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub order_id: i64,
    pub status: OrderStatus,
    /// Absent when the order had already been paid before this call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Drives PENDING -> PAYING -> PAID. Seats are never released here: a
/// declined card puts the order back to PENDING until it is cancelled or
/// expires.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, orders: Arc<dyn OrderStore>) -> Self {
        Self { gateway, orders }
    }

    pub async fn pay(&self, identity: &Identity, order_id: i64, card: CardDetails) -> CoreResult<PaymentReceipt> {
        card.validate()?;

        // 1. Verify owner
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        identity.ensure_owner(&order)?;

        // 2. Only pending orders are charged
        match order.status {
            OrderStatus::Paid => {
                info!(order_id, "Order already paid, nothing charged");
                return Ok(PaymentReceipt { order_id, status: OrderStatus::Paid, transaction_id: None });
            }
            OrderStatus::Cancelled => {
                return Err(CoreError::Conflict(format!("order {} is cancelled", order_id)));
            }
            OrderStatus::Paying => {
                return Err(CoreError::Conflict(format!("order {} already has a payment in progress", order_id)));
            }
            OrderStatus::Pending => {}
        }

        // 3. Claim the order so no second attempt can charge it
        if !self.orders.begin_payment(order_id).await? {
            return Err(CoreError::Conflict(format!("order {} is no longer pending", order_id)));
        }

        // 4. Charge and settle on a task of its own; a dropped request must
        //    not leave the claim behind.
        let request = ChargeRequest { order_id, amount_minor: order.total_minor, card };
        let settlement = tokio::spawn(settle(self.gateway.clone(), self.orders.clone(), request));
        settlement
            .await
            .map_err(|e| CoreError::GatewayError(format!("payment task for order {} failed: {}", order_id, e)))?
    }
}

async fn settle(
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
    request: ChargeRequest,
) -> CoreResult<PaymentReceipt> {
    let order_id = request.order_id;

    let transaction_id = match gateway.charge(&request).await {
        Ok(PaymentOutcome::Approved { transaction_id }) => transaction_id,
        Ok(PaymentOutcome::Declined { reason }) => {
            warn!(order_id, %reason, "Payment declined");
            release(orders.as_ref(), order_id).await;
            return Err(CoreError::PaymentError(reason));
        }
        Err(e) => {
            warn!(order_id, error = %e, "Payment gateway failed");
            release(orders.as_ref(), order_id).await;
            return Err(e);
        }
    };

    match orders.mark_paid(order_id).await {
        Ok(true) => {
            info!(order_id, %transaction_id, amount_minor = request.amount_minor, "Order paid");
            Ok(PaymentReceipt { order_id, status: OrderStatus::Paid, transaction_id: Some(transaction_id) })
        }
        Ok(false) => {
            error!(order_id, %transaction_id, "Charge approved but the payment claim was lost, refund required");
            Err(CoreError::Conflict(format!("order {} is no longer awaiting payment", order_id)))
        }
        Err(e) => {
            error!(order_id, %transaction_id, error = %e, "Charge approved but the order could not be marked paid");
            Err(e)
        }
    }
}

async fn release(orders: &dyn OrderStore, order_id: i64) {
    match orders.release_payment(order_id).await {
        Ok(true) => debug!(order_id, "Payment claim released"),
        Ok(false) => warn!(order_id, "Payment claim already gone"),
        Err(e) => error!(order_id, error = %e, "Failed to release payment claim"),
    }
}

/// Card number the mock gateway always declines.
pub const DECLINED_TEST_CARD: &str = "4000000000000002";
/// Card number that makes the mock gateway behave as if it were unreachable.
pub const UNAVAILABLE_TEST_CARD: &str = "4000000000000119";

pub struct MockPaymentGateway;

#[async_trait::async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> CoreResult<PaymentOutcome> {
        let card_number = request.card.card_number.expose().as_str();
        debug!(
            order_id = request.order_id,
            amount_minor = request.amount_minor,
            card = %request.card.card_number.last4(),
            "Mock charge"
        );

        // Triggers for testing the circuit breaker and declines
        match card_number {
            UNAVAILABLE_TEST_CARD => Err(CoreError::GatewayError("simulated gateway outage".to_string())),
            DECLINED_TEST_CARD => Ok(PaymentOutcome::Declined { reason: "card declined".to_string() }),
            _ => Ok(PaymentOutcome::Approved {
                transaction_id: format!("txn_{}", Uuid::new_v4().simple()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rail_shared::{Masked, NewOrder, NewTicket};
    use rail_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingGateway {
        calls: AtomicUsize,
        latency: Duration,
    }

    #[async_trait::async_trait]
    impl PaymentGateway for CountingGateway {
        async fn charge(&self, request: &ChargeRequest) -> CoreResult<PaymentOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            MockPaymentGateway.charge(request).await
        }
    }

    fn card(number: &str) -> CardDetails {
        CardDetails {
            card_number: Masked::new(number.to_string()),
            expiry_date: "12/30".to_string(),
            cvv: Masked::new("123".to_string()),
        }
    }

    async fn setup() -> (PaymentOrchestrator, Arc<MemoryStore>, Arc<CountingGateway>, i64) {
        setup_with_latency(Duration::ZERO).await
    }

    async fn setup_with_latency(
        latency: Duration,
    ) -> (PaymentOrchestrator, Arc<MemoryStore>, Arc<CountingGateway>, i64) {
        let store = Arc::new(
            MemoryStore::with_seed(&rail_catalog::bootstrap_catalog()).await.unwrap(),
        );
        let order = store
            .create_reserved_order(NewOrder {
                user_id: 1,
                route_id: Some(1),
                created_at: Utc::now(),
                tickets: vec![NewTicket {
                    seat_id: 1,
                    passenger_id: None,
                    departure_date: NaiveDate::from_ymd_opt(2030, 8, 1).unwrap(),
                    price_minor: 2800,
                }],
            })
            .await
            .unwrap();
        let gateway = Arc::new(CountingGateway { calls: AtomicUsize::new(0), latency });
        let orchestrator = PaymentOrchestrator::new(gateway.clone(), store.clone());
        (orchestrator, store, gateway, order.id)
    }

    #[tokio::test]
    async fn test_pay_marks_order_paid_once() {
        let (payments, store, gateway, order_id) = setup().await;
        let user = Identity::passenger(1);

        let receipt = payments.pay(&user, order_id, card("4111111111111111")).await.unwrap();
        assert_eq!(receipt.status, OrderStatus::Paid);
        assert!(receipt.transaction_id.unwrap().starts_with("txn_"));

        // Paying again charges nothing.
        let again = payments.pay(&user, order_id, card("4111111111111111")).await.unwrap();
        assert_eq!(again.status, OrderStatus::Paid);
        assert_eq!(again.transaction_id, None);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.tickets.len(), 1);
    }

    #[tokio::test]
    async fn test_declined_card_keeps_seat_held() {
        let (payments, store, _, order_id) = setup().await;

        let result = payments.pay(&Identity::passenger(1), order_id, card(DECLINED_TEST_CARD)).await;
        assert!(matches!(result, Err(CoreError::PaymentError(_))));

        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        let date = order.tickets[0].departure_date;
        assert!(!store.is_available(1, date).await.unwrap());
    }

    #[tokio::test]
    async fn test_gateway_outage_is_reported() {
        let (payments, store, _, order_id) = setup().await;
        let result = payments.pay(&Identity::passenger(1), order_id, card(UNAVAILABLE_TEST_CARD)).await;
        assert!(matches!(result, Err(CoreError::GatewayError(_))));

        // The claim is released so the traveller can retry.
        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(payments.pay(&Identity::passenger(1), order_id, card("4111111111111111")).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_pays_charge_once() {
        let (payments, store, gateway, order_id) = setup_with_latency(Duration::from_millis(50)).await;
        let user = Identity::passenger(1);

        let (first, second) = tokio::join!(
            payments.pay(&user, order_id, card("4111111111111111")),
            payments.pay(&user, order_id, card("4111111111111111")),
        );

        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        let charged = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Ok(PaymentReceipt { transaction_id: Some(_), .. })))
            .count();
        assert_eq!(charged, 1);
        for result in [&first, &second] {
            assert!(matches!(result, Ok(_) | Err(CoreError::Conflict(_))));
        }
        assert_eq!(store.get_order(order_id).await.unwrap().unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_payment_settles_when_caller_goes_away() {
        let (payments, store, gateway, order_id) = setup_with_latency(Duration::from_millis(50)).await;
        let user = Identity::passenger(1);

        let dropped = tokio::time::timeout(
            Duration::from_millis(10),
            payments.pay(&user, order_id, card("4111111111111111")),
        )
        .await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_order(order_id).await.unwrap().unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_cannot_pay_foreign_or_cancelled_orders() {
        let (payments, store, gateway, order_id) = setup().await;

        let foreign = payments.pay(&Identity::passenger(2), order_id, card("4111111111111111")).await;
        assert!(matches!(foreign, Err(CoreError::AuthorizationError(_))));

        store.cancel_pending(order_id).await.unwrap();
        let cancelled = payments.pay(&Identity::passenger(1), order_id, card("4111111111111111")).await;
        assert!(matches!(cancelled, Err(CoreError::Conflict(_))));

        let missing = payments.pay(&Identity::passenger(1), 404, card("4111111111111111")).await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_card_fields_are_rejected() {
        let (payments, _, _, order_id) = setup().await;
        let result = payments.pay(&Identity::passenger(1), order_id, card("")).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }
}
