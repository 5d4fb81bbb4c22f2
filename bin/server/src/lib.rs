//! varekatalog login host.
//!
//! Serves the OAuth redirect flow and the session API the catalog UI uses
//! to decide what to show: search for everyone, prices and inventory for
//! signed-in users holding the matching scopes.

pub mod auth;
pub mod config;

#[cfg(test)]
mod test_support;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use auth::AppState;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Auth routes
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", get(auth::logout))
        // Session API
        .route("/api/auth/state", get(auth::state))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/token", get(auth::access_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
