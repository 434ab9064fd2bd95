use std::sync::Arc;
use std::time::Duration;

use rail_catalog::RouteSearchEngine;
use rail_core::payment::PaymentGateway;
use rail_order::{PaymentOrchestrator, ReservationManager, SeatAvailability};
use rail_store::app_config::PaymentConfig;
use rail_store::Stores;

use crate::middleware::ResiliencyState;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<RouteSearchEngine>,
    pub availability: Arc<SeatAvailability>,
    pub reservations: Arc<ReservationManager>,
    pub payments: Arc<PaymentOrchestrator>,
    pub resiliency: Arc<ResiliencyState>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        stores: &Stores,
        gateway: Arc<dyn PaymentGateway>,
        auth: AuthConfig,
        payments: &PaymentConfig,
    ) -> Self {
        Self {
            search: Arc::new(RouteSearchEngine::new(stores.catalog.clone())),
            availability: Arc::new(SeatAvailability::new(stores.catalog.clone(), stores.orders.clone())),
            reservations: Arc::new(ReservationManager::new(
                stores.catalog.clone(),
                stores.passengers.clone(),
                stores.orders.clone(),
            )),
            payments: Arc::new(PaymentOrchestrator::new(gateway, stores.orders.clone())),
            resiliency: Arc::new(ResiliencyState::new(
                payments.failure_threshold,
                Duration::from_secs(payments.reset_timeout_seconds),
            )),
            auth,
        }
    }
}
