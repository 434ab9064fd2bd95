use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};

use rail_core::identity::Identity;
use rail_core::payment::CardDetails;
use rail_order::{OrderView, PaymentReceipt, ReservationRequest};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order).delete(cancel_order))
        .route("/orders/{id}/pay", post(pay_order))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /orders
/// Reserve one seat; 409 when the slot is already held.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<ReservationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), AppError> {
    let Json(request) = payload?;
    let order = state.reservations.reserve(&identity, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders
/// The caller's orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    Ok(Json(state.reservations.list_orders(&identity).await?))
}

/// GET /orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<OrderView>, AppError> {
    let Path(order_id) = path?;
    Ok(Json(state.reservations.get_order(&identity, order_id).await?))
}

/// DELETE /orders/{id}
/// Cancels a pending order and frees its seat.
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(order_id) = path?;
    state.reservations.cancel_order(&identity, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /orders/{id}/pay
pub async fn pay_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CardDetails>, JsonRejection>,
) -> Result<Json<PaymentReceipt>, AppError> {
    let Path(order_id) = path?;
    let Json(card) = payload?;
    let receipt = state.payments.pay(&identity, order_id, card).await?;
    Ok(Json(receipt))
}
