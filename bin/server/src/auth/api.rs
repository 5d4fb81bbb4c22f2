//! JSON endpoints the catalog UI polls for its session.

use axum::Json;
use serde::Serialize;
use varekatalog_auth::{AuthState, PermissionSet};

use super::BrowserSession;

/// Session state as the UI sees it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    is_authenticated: bool,
    is_loading: bool,
    username: Option<String>,
    display_name: Option<String>,
    error: Option<String>,
    scopes: Vec<&'static str>,
    permissions: PermissionSet,
}

impl From<&AuthState> for StateResponse {
    fn from(state: &AuthState) -> Self {
        let identity = state.identity();
        Self {
            is_authenticated: state.is_authenticated(),
            is_loading: state.is_loading(),
            username: identity.map(|i| i.username().to_string()),
            display_name: identity.and_then(|i| i.display_name()).map(str::to_string),
            error: state.error().map(str::to_string),
            scopes: state.scopes().iter().map(|s| s.as_str()).collect(),
            permissions: state.permissions(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    access_token: Option<String>,
}

/// `GET /api/auth/state`
pub async fn state(session: BrowserSession) -> Json<StateResponse> {
    let state = session.manager.auth_state().await;
    Json(StateResponse::from(&state))
}

/// `POST /api/auth/refresh`
pub async fn refresh(session: BrowserSession) -> Json<StateResponse> {
    session.manager.refresh_session().await;
    let state = session.manager.auth_state().await;
    Json(StateResponse::from(&state))
}

/// `GET /api/auth/token`
pub async fn access_token(session: BrowserSession) -> Json<TokenResponse> {
    let access_token = session.manager.get_access_token().await;
    Json(TokenResponse { access_token })
}
