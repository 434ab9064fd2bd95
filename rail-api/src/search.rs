use axum::{
    extract::{rejection::PathRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use rail_catalog::RouteDetails;
use rail_core::search::{RouteQuery, RouteSummary};
use rail_order::SeatMap;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SeatMapQuery {
    pub date: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/routes/search", get(search_routes))
        .route("/routes/{id}", get(get_route))
        .route("/routes/{id}/seats", get(get_seat_map))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /routes/search?from_city=&to_city=&date=
/// Empty list when nothing connects the two cities.
async fn search_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<Vec<RouteSummary>>, AppError> {
    let search = query.validate()?;
    let results = state.search.search(&search).await?;
    Ok(Json(results))
}

/// GET /routes/{id}
async fn get_route(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<RouteDetails>, AppError> {
    let Path(route_id) = path?;
    Ok(Json(state.search.route_details(route_id).await?))
}

/// GET /routes/{id}/seats?date=
async fn get_seat_map(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    Query(query): Query<SeatMapQuery>,
) -> Result<Json<SeatMap>, AppError> {
    let Path(route_id) = path?;
    let raw = query
        .date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::ValidationError("date is required".to_string()))?;
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("date must be YYYY-MM-DD, got {}", raw)))?;

    Ok(Json(state.availability.seat_map(route_id, date).await?))
}
