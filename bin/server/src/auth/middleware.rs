//! Browser session extractor for Axum.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::convert::Infallible;
use std::sync::Arc;
use time::Duration as TimeDuration;
use varekatalog_auth::SessionManager;
use varekatalog_core::ClientSessionId;

use super::{AppState, SessionRegistry};

/// Session cookie name.
pub const SESSION_COOKIE: &str = "vk_session";

/// The requesting browser's session.
///
/// Browsers without a live session get a detached manager: it answers like
/// a signed-out session but is never registered.
pub struct BrowserSession {
    pub id: Option<ClientSessionId>,
    pub manager: Arc<SessionManager>,
    secure: bool,
}

impl BrowserSession {
    /// Registers the browser if it has no live session yet.
    ///
    /// Returns the manager to use and `jar` with the session cookie added
    /// when one was issued.
    pub async fn persistent(
        self,
        sessions: &SessionRegistry,
        jar: CookieJar,
    ) -> (Arc<SessionManager>, CookieJar) {
        if self.id.is_some() {
            return (self.manager, jar);
        }

        let (id, manager) = sessions.register().await;
        let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax);
        (manager, jar.add(cookie))
    }

    /// Returns `jar` with the session cookie expired.
    pub fn forget(jar: CookieJar) -> CookieJar {
        let cookie = Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .max_age(TimeDuration::ZERO);
        jar.add(cookie)
    }
}

impl<S> FromRequestParts<S> for BrowserSession
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_request_parts(parts, state).await?;
        let secure = app_state.session_config.secure_cookies;

        let requested = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| cookie.value().parse::<ClientSessionId>().ok());
        let existing = match requested {
            Some(id) => app_state.sessions.find(id).await.map(|manager| (id, manager)),
            None => None,
        };
        if let Some((id, manager)) = existing {
            return Ok(BrowserSession {
                id: Some(id),
                manager,
                secure,
            });
        }

        Ok(BrowserSession {
            id: None,
            manager: app_state.sessions.detached().await,
            secure,
        })
    }
}
