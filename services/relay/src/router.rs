use crate::error::AppError;
use crate::handlers::{data, health, page};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let data_routes = Router::new()
        .route("/data", get(data::get_data))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/", get(page::get_index))
        .route("/index.html", get(page::get_index))
        .route("/healthz", get(health::get_health))
        .merge(data_routes)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("no such route".to_string())
}
