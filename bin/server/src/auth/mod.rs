//! Authentication module for the varekatalog server.
//!
//! This module provides:
//! - The login redirect, OAuth callback page and logout redirect
//! - A JSON API exposing the session state, refresh and bearer token
//! - One `SessionManager` per browser that started a login, keyed by a
//!   session cookie
//!
//! # Session Model
//!
//! The browser only ever holds an opaque `vk_session` cookie. Tokens, the
//! PKCE state nonce and the code verifier stay in that browser's
//! server-side storage, which lives as long as the browser keeps using it.
//! Requests without a live session are answered by a detached, signed-out
//! manager and never registered. Idle sessions are swept periodically.

pub mod api;
pub mod middleware;
pub mod page;
pub mod registry;
pub mod routes;

use crate::config::SessionConfig;

pub use api::{access_token, refresh, state};
pub use middleware::BrowserSession;
pub use registry::SessionRegistry;
pub use routes::{callback, login, logout};

/// Shared application state.
pub struct AppState {
    /// Browser sessions by cookie id.
    pub sessions: SessionRegistry,
    /// Session configuration.
    pub session_config: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(sessions: SessionRegistry, session_config: SessionConfig) -> Self {
        Self {
            sessions,
            session_config,
        }
    }
}
