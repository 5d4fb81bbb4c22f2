//! Authentication state of one client instance.
//!
//! `AuthState` is what the UI reads: whether someone is signed in, who, the
//! bearer token for API calls, and the derived permissions. It can only be
//! built through constructors that keep it consistent: an authenticated
//! state always has a token and an identity, and permissions are always
//! computed from the scopes.

use serde::Serialize;

use crate::identity::Identity;
use crate::permission::PermissionSet;
use crate::scope::{ScopeSet, extract_scopes};

/// Snapshot of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    is_authenticated: bool,
    is_loading: bool,
    identity: Option<Identity>,
    #[serde(skip)]
    access_token: Option<String>,
    error: Option<String>,
    scopes: ScopeSet,
}

impl AuthState {
    /// Session resolution in progress.
    #[must_use]
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::unauthenticated()
        }
    }

    /// Nobody signed in.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            is_authenticated: false,
            is_loading: false,
            identity: None,
            access_token: None,
            error: None,
            scopes: ScopeSet::empty(),
        }
    }

    /// Nobody signed in, with a message explaining why.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::unauthenticated()
        }
    }

    /// Signed in. Scopes are derived from `access_token`.
    #[must_use]
    pub fn authenticated(identity: Identity, access_token: String) -> Self {
        let scopes = extract_scopes(&access_token);
        Self {
            is_authenticated: true,
            is_loading: false,
            identity: Some(identity),
            access_token: Some(access_token),
            error: None,
            scopes,
        }
    }

    /// Attaches an error message without changing anything else.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true if a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    /// Returns true while the session is being resolved.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Returns the signed-in user.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Returns the bearer token for downstream API calls.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Returns the last error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the granted scopes.
    #[must_use]
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// Returns the capabilities derived from the granted scopes.
    #[must_use]
    pub fn permissions(&self) -> PermissionSet {
        PermissionSet::from_scopes(&self.scopes)
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::unauthenticated()
    }
}
