//! HTTP route handlers and router assembly.
//!
//! - `admin`: block list management and read-only request log queries
//! - `health`: health, readiness, metrics and version endpoints
//! - `test_geo`: echo endpoint for checking client IP resolution

pub mod admin;
pub mod health;
pub mod test_geo;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::track_requests;
use crate::state::AppState;

/// Builds the application router with the request interceptor wrapping every route.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/test-geo/", get(test_geo::test_geo_get).post(test_geo::test_geo_post));

    if state.config.admin.enabled {
        app = app
            .route("/admin/logs", get(admin::list_logs))
            .route("/admin/logs/{id}", get(admin::get_log))
            .route("/admin/blocked-ips", get(admin::list_blocked).post(admin::create_blocked))
            .route(
                "/admin/blocked-ips/{id}",
                get(admin::get_blocked).patch(admin::update_blocked).delete(admin::delete_blocked),
            )
            .route("/admin/blocked-ips/{id}/activate", post(admin::activate_blocked))
            .route("/admin/blocked-ips/{id}/deactivate", post(admin::deactivate_blocked));
    }

    let interceptor = state.interceptor.clone();
    app.with_state(state)
        // Globales Body-Limit (1 MB)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(from_fn_with_state(interceptor, track_requests))
        .layer(TraceLayer::new_for_http())
}
