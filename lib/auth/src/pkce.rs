//! PKCE exchange context and its single-use lifecycle.
//!
//! A `PkceContext` is created right before the redirect to the identity
//! provider and its `state` and `code_verifier` are persisted in tab-scoped
//! storage. On the callback the persisted pair is taken as a
//! `PendingAuthorization`, which deletes whatever is left of it when dropped,
//! so every callback outcome leaves storage clean.

use oauth2::{CsrfToken, PkceCodeChallenge};
use rootcause::prelude::Report;

use crate::error::StorageError;
use crate::storage::{CODE_VERIFIER_KEY, STATE_KEY, SessionStorage};

/// Random bytes behind the verifier and the state nonce.
const RANDOM_BYTES: u32 = 32;

/// Transient secrets binding one authorization request to its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceContext {
    code_verifier: String,
    code_challenge: String,
    state: String,
}

impl PkceContext {
    /// Generates a fresh verifier, its S256 challenge and a state nonce.
    #[must_use]
    pub fn generate() -> Self {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256_len(RANDOM_BYTES);
        let state = CsrfToken::new_random_len(RANDOM_BYTES);

        Self {
            code_verifier: verifier.secret().clone(),
            code_challenge: challenge.as_str().to_string(),
            state: state.secret().clone(),
        }
    }

    /// The verifier. Never leaves this client except in the token request.
    #[must_use]
    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    /// `BASE64URL(SHA256(code_verifier))`, unpadded.
    #[must_use]
    pub fn code_challenge(&self) -> &str {
        &self.code_challenge
    }

    /// The CSRF state nonce.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Writes the state nonce and the verifier to storage.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails.
    pub fn persist(&self, storage: &dyn SessionStorage) -> Result<(), Report<StorageError>> {
        storage.set(STATE_KEY, &self.state)?;
        storage.set(CODE_VERIFIER_KEY, &self.code_verifier)?;
        Ok(())
    }
}

/// The persisted half of a login attempt, taken on the callback.
///
/// The state nonce is deleted right after it has been compared; anything
/// still stored when the guard is dropped is deleted then.
pub struct PendingAuthorization<'a> {
    storage: &'a dyn SessionStorage,
    state: Option<String>,
    code_verifier: Option<String>,
    state_removed: bool,
}

impl<'a> PendingAuthorization<'a> {
    /// Reads the persisted state nonce and verifier.
    ///
    /// Unreadable entries are treated as absent.
    #[must_use]
    pub fn take(storage: &'a dyn SessionStorage) -> Self {
        Self {
            storage,
            state: read(storage, STATE_KEY),
            code_verifier: read(storage, CODE_VERIFIER_KEY),
            state_removed: false,
        }
    }

    /// Compares the returned state with the persisted one, then deletes the
    /// persisted nonce whatever the result.
    ///
    /// Returns true only if a nonce was persisted and it matches.
    pub fn verify_state(&mut self, returned: Option<&str>) -> bool {
        let matches = match (self.state.as_deref(), returned) {
            (Some(expected), Some(returned)) => expected == returned,
            _ => false,
        };
        self.remove_state();
        matches
    }

    /// The persisted verifier, if any.
    #[must_use]
    pub fn code_verifier(&self) -> Option<&str> {
        self.code_verifier.as_deref()
    }

    fn remove_state(&mut self) {
        if self.state_removed {
            return;
        }
        self.state_removed = true;
        self.state = None;
        if let Err(e) = self.storage.remove(STATE_KEY) {
            tracing::warn!(error = %e, "failed to delete persisted state nonce");
        }
    }
}

impl Drop for PendingAuthorization<'_> {
    fn drop(&mut self) {
        self.remove_state();
        if let Err(e) = self.storage.remove(CODE_VERIFIER_KEY) {
            tracing::warn!(error = %e, "failed to delete persisted code verifier");
        }
    }
}

fn read(storage: &dyn SessionStorage, key: &str) -> Option<String> {
    storage.get(key).unwrap_or_else(|e| {
        tracing::warn!(error = %e, key, "failed to read pending authorization");
        None
    })
}
