//! Authentication routes for login, callback, and logout.

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use varekatalog_auth::CallbackParams;

use super::{AppState, BrowserSession, page};

/// Starts a login by redirecting to the identity provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: BrowserSession,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    let (manager, jar) = session.persistent(&state.sessions, jar).await;
    let url = manager.sign_in().await.map_err(|e| {
        tracing::error!(error = %e, "could not start login");
        AuthError::LoginUnavailable
    })?;

    Ok((jar, Redirect::to(url.as_str())).into_response())
}

/// Handles the identity provider's redirect back after authentication.
pub async fn callback(session: BrowserSession, RawQuery(query): RawQuery) -> Response {
    let params = CallbackParams::from_query(query.as_deref().unwrap_or_default());
    let outcome = session.manager.handle_callback(&params).await;
    page::render(&outcome)
}

/// Ends the session and redirects to the identity provider's logout.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: BrowserSession,
    jar: CookieJar,
) -> impl IntoResponse {
    let url = session.manager.sign_out().await;
    if let Some(id) = &session.id {
        state.sessions.remove(id).await;
    }

    (BrowserSession::forget(jar), Redirect::to(url.as_str()))
}

/// Authentication errors.
#[derive(Debug)]
pub enum AuthError {
    LoginUnavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::LoginUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Login is temporarily unavailable",
            ),
        };

        (status, message).into_response()
    }
}
