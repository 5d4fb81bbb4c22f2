//! Tokens returned by the identity provider and their persistence.

use chrono::{DateTime, Duration, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::claims;
use crate::error::StorageError;
use crate::scope::ScopeSet;
use crate::storage::{SCOPES_KEY, SessionStorage, TOKENS_KEY};

/// Access, refresh and id tokens of one session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Creates a token set holding only an access token.
    ///
    /// The expiry defaults to the token's `exp` claim when it has one.
    #[must_use]
    pub fn new(access_token: String) -> Self {
        let expires_at = claims::decode_claims(&access_token)
            .ok()
            .and_then(|c| claims::expiry(&c));
        Self {
            access_token,
            refresh_token: None,
            id_token: None,
            expires_at,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Sets the id token.
    #[must_use]
    pub fn with_id_token(mut self, id_token: Option<String>) -> Self {
        self.id_token = id_token;
        self
    }

    /// Sets the expiry from a relative lifetime, measured from now.
    #[must_use]
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_at = Some(Utc::now() + expires_in);
        self
    }

    /// Returns the bearer token for API calls.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token, if present.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns the id token, if present.
    #[must_use]
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    /// Returns when the access token expires, if known.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the access token expires within `leeway`.
    ///
    /// Tokens with unknown expiry are treated as live.
    #[must_use]
    pub fn expires_within(&self, leeway: Duration) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - leeway <= Utc::now())
    }

    /// Fills in what a refresh response omitted from the previous set.
    ///
    /// Refresh responses usually carry no new refresh token.
    #[must_use]
    pub fn inherit_from(mut self, previous: &TokenSet) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.refresh_token.clone();
        }
        if self.id_token.is_none() {
            self.id_token = previous.id_token.clone();
        }
        self
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[redacted]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Reads and writes the session's tokens in tab-scoped storage.
pub struct TokenStore<'a> {
    storage: &'a dyn SessionStorage,
}

impl<'a> TokenStore<'a> {
    /// Wraps a storage backend.
    #[must_use]
    pub fn new(storage: &'a dyn SessionStorage) -> Self {
        Self { storage }
    }

    /// Loads the persisted token set.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the stored value is not a token set.
    pub fn load(&self) -> Result<Option<TokenSet>, Report<StorageError>> {
        let Some(raw) = self.storage.get(TOKENS_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            StorageError::Corrupt {
                key: TOKENS_KEY.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Persists a token set together with the scopes derived from it.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails.
    pub fn save(&self, tokens: &TokenSet, scopes: &ScopeSet) -> Result<(), Report<StorageError>> {
        self.storage.set(TOKENS_KEY, &encode(TOKENS_KEY, tokens)?)?;
        self.storage.set(SCOPES_KEY, &encode(SCOPES_KEY, scopes)?)?;
        Ok(())
    }

    /// Removes the persisted tokens and scope cache.
    ///
    /// Both removals are attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if a removal fails.
    pub fn clear(&self) -> Result<(), Report<StorageError>> {
        let tokens = self.storage.remove(TOKENS_KEY);
        let scopes = self.storage.remove(SCOPES_KEY);
        tokens.and(scopes)
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, Report<StorageError>> {
    serde_json::to_string(value).map_err(|e| {
        StorageError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}
