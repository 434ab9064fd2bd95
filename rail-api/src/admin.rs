use axum::{
    extract::State,
    routing::get,
    Extension, Json, Router,
};

use rail_core::identity::Identity;
use rail_order::OrderView;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/orders", get(list_all_orders))
}

/// GET /admin/orders
/// Every order in the system, newest first.
pub async fn list_all_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    Ok(Json(state.reservations.list_all_orders(&identity).await?))
}
