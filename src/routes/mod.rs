pub mod activities;
pub mod links;
pub mod participants;
pub mod trips;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state);
    Router::new()
        .merge(trips::router())
        .merge(participants::router())
        .merge(activities::router())
        .merge(links::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Only the web frontend origin is allowed to call the API from a browser.
fn cors_layer(state: &AppState) -> CorsLayer {
    let origin = HeaderValue::from_str(&state.config.web_base_url)
        .unwrap_or_else(|_| HeaderValue::from_static("*"));
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}
