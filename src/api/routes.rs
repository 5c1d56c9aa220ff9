use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::auth::require_admin;
use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize;

    let mut admin = Router::new()
        .route("/admin/posts/:kind", post(handlers::create_post))
        .route(
            "/admin/posts/:kind/:id",
            put(handlers::update_post).delete(handlers::delete_post),
        );

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available");
        admin = admin.route("/admin/purge", delete(handlers::admin_purge));
    }

    let admin = admin
        .layer(DefaultBodyLimit::max(upload_limit))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_admin,
        ));

    Router::new()
        // Posts
        .route("/posts/:kind", get(handlers::list_posts))
        .route("/posts/:kind/:id", get(handlers::get_post))
        .route("/feed", get(handlers::home_feed))
        // Stored objects
        .route("/o/*key", get(handlers::serve_object))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
