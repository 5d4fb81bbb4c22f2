//! Tab-scoped key/value storage.
//!
//! In a browser this is `sessionStorage`: it survives the redirect to the
//! identity provider and back, but not a new browser session. The server
//! keeps one `MemoryStorage` per browser session for the same effect.

use rootcause::prelude::Report;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageError;

/// Persisted authorization state nonce.
pub const STATE_KEY: &str = "varekatalog.auth.state";
/// Persisted PKCE code verifier.
pub const CODE_VERIFIER_KEY: &str = "varekatalog.auth.code_verifier";
/// Persisted token set (JSON).
pub const TOKENS_KEY: &str = "varekatalog.auth.tokens";
/// Persisted derived scope list (JSON).
pub const SCOPES_KEY: &str = "varekatalog.auth.scopes";

/// Every key the session writes; all are removed on logout.
pub const ALL_KEYS: &[&str] = &[TOKENS_KEY, SCOPES_KEY, STATE_KEY, CODE_VERIFIER_KEY];

/// Key/value storage scoped to one browser tab or session.
///
/// Single writer per login attempt; a second concurrent login overwrites
/// the first one's entries.
pub trait SessionStorage: Send + Sync {
    /// Reads a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Report<StorageError>>;

    /// Writes a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<(), Report<StorageError>>;

    /// Removes a value. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the removal.
    fn remove(&self, key: &str) -> Result<(), Report<StorageError>>;
}

/// In-process storage backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(
        &self,
        key: &str,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, Report<StorageError>> {
        self.entries.lock().map_err(|_| {
            StorageError::Unavailable {
                key: key.to_string(),
                reason: "storage lock poisoned".to_string(),
            }
            .into()
        })
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Report<StorageError>> {
        Ok(self.entries(key)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Report<StorageError>> {
        self.entries(key)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Report<StorageError>> {
        self.entries(key)?.remove(key);
        Ok(())
    }
}
