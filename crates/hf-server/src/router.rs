//! Axum router construction.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::auth::auth_middleware;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
///
/// `/health` is always public; everything else goes through
/// [`auth_middleware`], which is a no-op unless an API key is configured.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected_routes = Router::new()
        .route("/optimize-version", post(routes::jobs::optimize_version))
        .route("/job-status/{id}", get(routes::jobs::job_status))
        .route("/cancel-job/{id}", delete(routes::jobs::cancel_job))
        .route("/all-jobs", get(routes::jobs::all_jobs))
        .route("/download/{id}", get(routes::download::download))
        .route("/statistics", get(routes::cache::statistics))
        .route("/delete-cache", delete(routes::cache::delete_cache))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), auth_middleware));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .with_state(ctx)
}
