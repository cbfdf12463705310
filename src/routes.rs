use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn api_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/bookings/:id/confirm",
            post(handlers::bookings::confirm_booking),
        )
        .route(
            "/bookings/:id/reschedule",
            post(handlers::bookings::reschedule_booking),
        )
        .route(
            "/coupons",
            get(handlers::coupons::list_coupons).post(handlers::coupons::create_coupon),
        )
        .route(
            "/services",
            get(handlers::catalog::list_services).post(handlers::catalog::create_service),
        )
        .route("/loyalty", get(handlers::loyalty::list_loyalty))
        .route("/loyalty/:customer", get(handlers::loyalty::get_loyalty));

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api", api)
        .with_state(state)
}

/// Full application: API routes plus CORS for the configured client origin and request tracing.
pub fn app(state: Arc<AppState>) -> anyhow::Result<Router> {
    let origin: HeaderValue = state
        .config
        .client_origin
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid CLIENT_ORIGIN '{}': {e}", state.config.client_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
