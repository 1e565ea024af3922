use axum::{http::Method, middleware::from_fn_with_state, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod documents;
pub mod error;
pub mod extract;
pub mod hostels;
pub mod metrics;
pub mod middleware;
pub mod notifications;
pub mod payments;
pub mod reviews;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::export))
        .merge(hostels::public_routes())
        .merge(payments::public_routes())
        .merge(reviews::public_routes());

    let protected = Router::new()
        .merge(hostels::routes())
        .merge(bookings::routes())
        .merge(payments::routes())
        .merge(documents::routes())
        .merge(reviews::routes())
        .merge(notifications::routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
