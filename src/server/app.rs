use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::api_routes;
use crate::websocket::ws_handler;

use super::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ws_path = state.settings.server.ws_path.clone();

    Router::new()
        .route(&ws_path, get(ws_handler))
        .merge(api_routes(&state.settings.server.health_path))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
