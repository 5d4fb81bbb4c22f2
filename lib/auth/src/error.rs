//! Error types for the auth crate.
//!
//! Errors that cross a network or storage boundary travel inside a
//! rootcause `Report`:
//! - `ProviderError`: identity-provider calls (token exchange, refresh)
//! - `StorageError`: tab-scoped storage backends
//! - `AuthenticationError`: failures starting a login
//!
//! `CallbackError` is the user-visible terminal failure of the callback
//! screen; its `Display` output is the message shown to the user.

use std::fmt;

/// Errors from identity-provider operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider endpoints or client settings are invalid.
    Configuration { reason: String },
    /// The request never produced an HTTP response.
    Network { reason: String },
    /// The request did not finish within the configured timeout.
    Timeout,
    /// The token endpoint answered with an OAuth error body.
    TokenEndpoint {
        error: String,
        description: Option<String>,
    },
    /// The token endpoint answered with something that is not a token response.
    MalformedResponse { reason: String },
    /// A refresh was requested but no refresh token is held.
    NoRefreshToken,
}

impl ProviderError {
    /// Message suitable for showing to the user.
    ///
    /// Returns the provider's `error_description` verbatim when it sent one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::TokenEndpoint {
                description: Some(description),
                ..
            } => description.clone(),
            Self::TokenEndpoint { error, .. } => error.clone(),
            Self::Timeout => "The identity provider did not respond in time".to_string(),
            Self::Network { .. } => "Could not reach the identity provider".to_string(),
            Self::MalformedResponse { .. } => {
                "The identity provider returned an unexpected response".to_string()
            }
            Self::Configuration { .. } => "Authentication is not configured correctly".to_string(),
            Self::NoRefreshToken => "No refresh token available".to_string(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { reason } => {
                write!(f, "identity provider configuration error: {reason}")
            }
            Self::Network { reason } => write!(f, "identity provider unreachable: {reason}"),
            Self::Timeout => write!(f, "identity provider request timed out"),
            Self::TokenEndpoint { error, description } => match description {
                Some(description) => write!(f, "token endpoint error '{error}': {description}"),
                None => write!(f, "token endpoint error '{error}'"),
            },
            Self::MalformedResponse { reason } => {
                write!(f, "malformed token response: {reason}")
            }
            Self::NoRefreshToken => write!(f, "no refresh token available"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors from tab-scoped storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend refused or failed the operation.
    Unavailable { key: String, reason: String },
    /// A stored value could not be decoded.
    Corrupt { key: String, reason: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { key, reason } => {
                write!(f, "storage unavailable for '{key}': {reason}")
            }
            Self::Corrupt { key, reason } => {
                write!(f, "stored value for '{key}' is corrupt: {reason}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors from starting a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The PKCE context could not be persisted before the redirect.
    PersistFailed { reason: String },
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PersistFailed { reason } => {
                write!(f, "could not prepare login: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Terminal failures of the OAuth callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The identity provider redirected back with an `error` parameter.
    Provider {
        error: String,
        description: Option<String>,
    },
    /// No `code` parameter on the callback URL.
    MissingCode,
    /// Persisted state nonce is absent or differs from the returned one.
    StateMismatch,
    /// No PKCE verifier was persisted for this login attempt.
    MissingVerifier,
    /// The token exchange failed.
    TokenExchange { message: String },
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider { error, description } => {
                f.write_str(description.as_deref().unwrap_or(error))
            }
            Self::MissingCode => f.write_str("Missing authorization code"),
            Self::StateMismatch => f.write_str("Invalid state parameter - possible CSRF attack"),
            Self::MissingVerifier => f.write_str("Missing PKCE code verifier"),
            Self::TokenExchange { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for CallbackError {}
