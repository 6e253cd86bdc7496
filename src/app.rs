use axum::Router;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::routes::{coach, health, prices};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/coach", coach::router())
        .nest("/prices", prices::router())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}
