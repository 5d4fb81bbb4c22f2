//! Per-browser session managers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use varekatalog_auth::{IdentityProvider, MemoryStorage, SessionManager, SessionSettings};
use varekatalog_core::ClientSessionId;

struct Entry {
    manager: Arc<SessionManager>,
    last_seen: Instant,
}

/// Session managers keyed by the browser's session cookie.
///
/// A browser gets its own manager with its own storage, the server-side
/// counterpart of a tab's session storage, once it starts a login.
pub struct SessionRegistry {
    provider: Arc<dyn IdentityProvider>,
    settings: SessionSettings,
    entries: Mutex<HashMap<ClientSessionId, Entry>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(provider: Arc<dyn IdentityProvider>, settings: SessionSettings) -> Self {
        Self {
            provider,
            settings,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the live manager for `id` and marks it as used.
    pub async fn find(&self, id: ClientSessionId) -> Option<Arc<SessionManager>> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(entry.manager.clone())
    }

    /// Creates a manager over empty storage without registering it.
    ///
    /// Serves browsers that have no session yet; whatever it records is
    /// dropped with it.
    pub async fn detached(&self) -> Arc<SessionManager> {
        Arc::new(
            SessionManager::initialize(
                self.provider.clone(),
                Arc::new(MemoryStorage::new()),
                self.settings.clone(),
            )
            .await,
        )
    }

    /// Creates and registers a session under a new id.
    pub async fn register(&self) -> (ClientSessionId, Arc<SessionManager>) {
        let id = ClientSessionId::new();
        let manager = self.detached().await;
        self.entries.lock().await.insert(
            id,
            Entry {
                manager: manager.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::debug!(session = %id, "browser session created");
        (id, manager)
    }

    /// Drops a browser session.
    pub async fn remove(&self, id: &ClientSessionId) -> bool {
        self.entries.lock().await.remove(id).is_some()
    }

    /// Drops every session unused for longer than `idle`. Returns how many
    /// were dropped.
    pub async fn sweep(&self, idle: Duration) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_seen.elapsed() <= idle);
        before - entries.len()
    }

    /// Number of live browser sessions.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if no browser session is live.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
