use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::{PriceQuery, PriceSeriesResponse};
use crate::services::price_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_prices))
}

/// GET /prices?tickers=AAPL,GLD&period=1y
pub async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<PriceSeriesResponse>, AppError> {
    info!("GET /prices - tickers: {}, period: {}", query.tickers, query.period);

    let (tickers, period) = price_service::parse_query(&query).map_err(|e| {
        warn!("Rejected price query: {}", e);
        e
    })?;

    let response =
        price_service::get_price_series(state.price_provider.as_ref(), &tickers, period).await;
    Ok(Json(response))
}
