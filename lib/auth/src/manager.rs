//! The session manager: one per client instance.
//!
//! Owns the authentication state and drives every flow that changes it:
//! bootstrap on start, login (both legs of the redirect), refresh, logout.
//! Consumers read snapshots through [`SessionManager::auth_state`]; there is
//! no global instance.

use rootcause::prelude::Report;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::callback::{CallbackParams, PostLoginRedirect};
use crate::config::SessionSettings;
use crate::error::{AuthenticationError, CallbackError};
use crate::identity::Identity;
use crate::pkce::{PendingAuthorization, PkceContext};
use crate::provider::IdentityProvider;
use crate::scope::extract_scopes;
use crate::session::AuthState;
use crate::storage::{ALL_KEYS, SessionStorage};
use crate::token::{TokenSet, TokenStore};

/// Authentication session of one client instance.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    storage: Arc<dyn SessionStorage>,
    settings: SessionSettings,
    state: RwLock<AuthState>,
    refresh_lock: Mutex<()>,
    /// Bumped after every completed refresh, login or logout.
    generation: AtomicU64,
}

impl SessionManager {
    /// Creates the manager and resolves any session persisted in `storage`.
    ///
    /// Resolution never fails: anything that goes wrong leaves the session
    /// unauthenticated without an error message.
    pub async fn initialize(
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn SessionStorage>,
        settings: SessionSettings,
    ) -> Self {
        let manager = Self {
            provider,
            storage,
            settings,
            state: RwLock::new(AuthState::loading()),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        };
        manager.bootstrap().await;
        manager
    }

    /// Returns a snapshot of the current state.
    pub async fn auth_state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    /// Starts a login: persists a fresh PKCE context and returns the
    /// authorization URL to navigate to.
    ///
    /// # Errors
    ///
    /// Returns `PersistFailed` if the state or verifier cannot be stored. The
    /// message is also recorded on the session.
    pub async fn sign_in(&self) -> Result<Url, Report<AuthenticationError>> {
        let pkce = PkceContext::generate();
        if let Err(e) = pkce.persist(self.storage.as_ref()) {
            warn!(error = %e, "failed to persist login context");
            let error = AuthenticationError::PersistFailed {
                reason: e.current_context().to_string(),
            };
            self.record_error(error.to_string()).await;
            return Err(error.into());
        }

        debug!("redirecting to identity provider");
        Ok(self.provider.authorization_url(&pkce))
    }

    /// Completes a login from the provider's callback parameters.
    ///
    /// The persisted state nonce and verifier are consumed whatever the
    /// outcome. The state is checked before any network call.
    ///
    /// # Errors
    ///
    /// Returns the terminal error to show on the callback screen.
    #[instrument(skip_all)]
    pub async fn handle_callback(
        &self,
        params: &CallbackParams,
    ) -> Result<PostLoginRedirect, CallbackError> {
        let result = self.complete_login(params).await;
        if let Err(error) = &result {
            warn!(%error, "login callback failed");
            self.record_error(error.to_string()).await;
        }
        result
    }

    async fn complete_login(
        &self,
        params: &CallbackParams,
    ) -> Result<PostLoginRedirect, CallbackError> {
        let mut pending = PendingAuthorization::take(self.storage.as_ref());

        if let Some(error) = &params.error {
            return Err(CallbackError::Provider {
                error: error.clone(),
                description: params.error_description.clone(),
            });
        }
        let Some(code) = params.code.as_deref() else {
            return Err(CallbackError::MissingCode);
        };
        if !pending.verify_state(params.state.as_deref()) {
            return Err(CallbackError::StateMismatch);
        }
        let Some(code_verifier) = pending.code_verifier() else {
            return Err(CallbackError::MissingVerifier);
        };

        let tokens = self
            .provider
            .exchange_code(code, code_verifier)
            .await
            .map_err(|e| {
                warn!(error = %e, "token exchange failed");
                CallbackError::TokenExchange {
                    message: e.current_context().user_message(),
                }
            })?;
        drop(pending);

        // A refresh started before the login must not overwrite it.
        let _guard = self.refresh_lock.lock().await;
        self.persist(&tokens);
        let state = established(&tokens);
        info!(
            username = state.identity().map(Identity::username),
            "signed in"
        );
        *self.state.write().await = state;
        self.generation.fetch_add(1, Ordering::AcqRel);

        Ok(PostLoginRedirect {
            target: self.settings.post_login_redirect.clone(),
            delay: self.settings.redirect_delay(),
        })
    }

    /// Returns a bearer token for an API call, refreshing it first if it
    /// expires within the leeway.
    ///
    /// Returns `None` when nobody is signed in or the refresh failed.
    pub async fn get_access_token(&self) -> Option<String> {
        let current = self
            .state
            .read()
            .await
            .access_token()
            .map(str::to_string)?;

        let tokens = match self.token_store().load() {
            Ok(Some(tokens)) if tokens.access_token() == current => tokens,
            Ok(_) => TokenSet::new(current),
            Err(e) => {
                debug!(error = %e, "falling back to in-memory token");
                TokenSet::new(current)
            }
        };

        if tokens.expires_within(self.settings.refresh_leeway()) {
            self.refresh_session().await
        } else {
            Some(tokens.access_token().to_string())
        }
    }

    /// Refreshes the session with the stored refresh token.
    ///
    /// Concurrent callers share one provider round trip: whoever queued
    /// behind a refresh that completed meanwhile gets its result. On failure
    /// the session is reset with an error and the stored tokens are cleared.
    pub async fn refresh_session(&self) -> Option<String> {
        let observed = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            debug!("reusing concurrent refresh result");
            return self.state.read().await.access_token().map(str::to_string);
        }

        let token = self.perform_refresh().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        token
    }

    #[instrument(skip_all)]
    async fn perform_refresh(&self) -> Option<String> {
        let current = match self.token_store().load() {
            Ok(Some(tokens)) => tokens,
            Ok(None) => return self.fail_refresh("no stored session".to_string()).await,
            Err(e) => return self.fail_refresh(e.current_context().to_string()).await,
        };

        match self.provider.refresh(&current).await {
            Ok(tokens) => {
                self.persist(&tokens);
                let token = tokens.access_token().to_string();
                *self.state.write().await = established(&tokens);
                info!("session refreshed");
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "refresh rejected");
                self.fail_refresh(e.current_context().user_message()).await
            }
        }
    }

    async fn fail_refresh(&self, reason: String) -> Option<String> {
        if let Err(e) = self.token_store().clear() {
            warn!(error = %e, "failed to clear stored tokens");
        }
        *self.state.write().await = AuthState::failed(format!("Session refresh failed: {reason}"));
        None
    }

    /// Ends the session locally and returns the provider logout URL.
    ///
    /// Every persisted entry is removed independently; failures are logged
    /// and skipped, so this always succeeds.
    pub async fn sign_out(&self) -> Url {
        let _guard = self.refresh_lock.lock().await;

        for key in ALL_KEYS {
            if let Err(e) = self.storage.remove(key) {
                warn!(error = %e, key, "failed to remove session entry");
            }
        }
        *self.state.write().await = AuthState::unauthenticated();
        self.generation.fetch_add(1, Ordering::AcqRel);

        info!("signed out");
        self.provider.logout_url()
    }

    async fn bootstrap(&self) {
        let resolved = match self.token_store().load() {
            Ok(Some(tokens)) => self.resume(tokens).await,
            Ok(None) => AuthState::unauthenticated(),
            Err(e) => {
                debug!(error = %e, "ignoring unreadable session");
                AuthState::unauthenticated()
            }
        };
        debug!(
            authenticated = resolved.is_authenticated(),
            "session resolved"
        );
        *self.state.write().await = resolved;
    }

    async fn resume(&self, tokens: TokenSet) -> AuthState {
        if !tokens.expires_within(self.settings.refresh_leeway()) {
            return established(&tokens);
        }

        match self.provider.refresh(&tokens).await {
            Ok(fresh) => {
                self.persist(&fresh);
                established(&fresh)
            }
            Err(e) => {
                debug!(error = %e, "stored session could not be refreshed");
                if let Err(e) = self.token_store().clear() {
                    debug!(error = %e, "failed to clear stale tokens");
                }
                AuthState::unauthenticated()
            }
        }
    }

    fn token_store(&self) -> TokenStore<'_> {
        TokenStore::new(self.storage.as_ref())
    }

    /// Writes tokens and their scope cache; the in-memory session stays
    /// usable if storage fails.
    fn persist(&self, tokens: &TokenSet) {
        let scopes = extract_scopes(tokens.access_token());
        if let Err(e) = self.token_store().save(tokens, &scopes) {
            warn!(error = %e, "failed to persist tokens");
        }
    }

    async fn record_error(&self, message: String) {
        let mut state = self.state.write().await;
        let current = std::mem::take(&mut *state);
        *state = current.with_error(message);
    }
}

fn established(tokens: &TokenSet) -> AuthState {
    AuthState::authenticated(
        Identity::from_tokens(tokens),
        tokens.access_token().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{CallbackScreen, CallbackStatus};
    use crate::claims::tests::token_with;
    use crate::error::{ProviderError, StorageError};
    use crate::permission::PermissionSet;
    use crate::storage::{CODE_VERIFIER_KEY, MemoryStorage, SCOPES_KEY, STATE_KEY, TOKENS_KEY};
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// Provider double that counts calls and never touches the network.
    struct FakeProvider {
        exchanged: TokenSet,
        refreshed: TokenSet,
        exchange_error: Option<ProviderError>,
        refresh_error: Option<ProviderError>,
        exchanges: AtomicUsize,
        refreshes: AtomicUsize,
    }

    impl FakeProvider {
        fn new(exchanged: TokenSet) -> Self {
            Self {
                exchanged,
                refreshed: live_tokens("refreshed-user", "refresh-2"),
                exchange_error: None,
                refresh_error: None,
                exchanges: AtomicUsize::new(0),
                refreshes: AtomicUsize::new(0),
            }
        }

        fn exchanges(&self) -> usize {
            self.exchanges.load(Ordering::SeqCst)
        }

        fn refreshes(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn authorization_url(&self, pkce: &PkceContext) -> Url {
            Url::parse_with_params(
                "https://login.example.com/oauth2/authorize",
                &[
                    ("state", pkce.state()),
                    ("code_challenge", pkce.code_challenge()),
                ],
            )
            .unwrap()
        }

        async fn exchange_code(
            &self,
            _code: &str,
            _code_verifier: &str,
        ) -> Result<TokenSet, Report<ProviderError>> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            match &self.exchange_error {
                Some(error) => Err(error.clone().into()),
                None => Ok(self.exchanged.clone()),
            }
        }

        async fn refresh(&self, current: &TokenSet) -> Result<TokenSet, Report<ProviderError>> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            match &self.refresh_error {
                Some(error) => Err(error.clone().into()),
                None => Ok(self.refreshed.clone().inherit_from(current)),
            }
        }

        fn logout_url(&self) -> Url {
            Url::parse("https://login.example.com/logout?client_id=katalog-web").unwrap()
        }
    }

    /// Storage that rejects every operation.
    struct UnavailableStorage;

    impl SessionStorage for UnavailableStorage {
        fn get(&self, key: &str) -> Result<Option<String>, Report<StorageError>> {
            Err(unavailable(key))
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), Report<StorageError>> {
            Err(unavailable(key))
        }

        fn remove(&self, key: &str) -> Result<(), Report<StorageError>> {
            Err(unavailable(key))
        }
    }

    fn unavailable(key: &str) -> Report<StorageError> {
        StorageError::Unavailable {
            key: key.to_string(),
            reason: "storage disabled".to_string(),
        }
        .into()
    }

    fn live_tokens(username: &str, refresh_token: &str) -> TokenSet {
        TokenSet::new(token_with(&json!({
            "username": username,
            "scope": "openid varekatalog/inventory"
        })))
        .with_refresh_token(Some(refresh_token.to_string()))
        .with_expires_in(Duration::hours(1))
    }

    fn expired_tokens() -> TokenSet {
        TokenSet::new(token_with(&json!({"username": "stale"})))
            .with_refresh_token(Some("refresh-1".to_string()))
            .with_expires_in(Duration::seconds(-10))
    }

    fn seeded_storage(tokens: &TokenSet) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        TokenStore::new(storage.as_ref())
            .save(tokens, &extract_scopes(tokens.access_token()))
            .unwrap();
        storage
    }

    async fn manager(provider: &Arc<FakeProvider>, storage: &Arc<MemoryStorage>) -> SessionManager {
        SessionManager::initialize(
            provider.clone(),
            storage.clone(),
            SessionSettings::default(),
        )
        .await
    }

    fn callback(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..CallbackParams::default()
        }
    }

    fn persisted_state(storage: &MemoryStorage) -> String {
        storage.get(STATE_KEY).unwrap().unwrap()
    }

    #[tokio::test]
    async fn bootstrap_without_tokens_is_silent() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;

        let state = manager.auth_state().await;
        assert!(!state.is_authenticated());
        assert!(!state.is_loading());
        assert_eq!(state.error(), None);
        assert_eq!(provider.refreshes(), 0);
    }

    #[tokio::test]
    async fn bootstrap_adopts_live_tokens() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = seeded_storage(&live_tokens("ola", "refresh-1"));
        let manager = manager(&provider, &storage).await;

        let state = manager.auth_state().await;
        assert!(state.is_authenticated());
        assert_eq!(state.identity().map(Identity::username), Some("ola"));
        assert!(state.permissions().can_view_inventory());
        assert_eq!(provider.refreshes(), 0);
    }

    #[tokio::test]
    async fn bootstrap_refreshes_expired_tokens() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = seeded_storage(&expired_tokens());
        let manager = manager(&provider, &storage).await;

        let state = manager.auth_state().await;
        assert!(state.is_authenticated());
        assert_eq!(
            state.identity().map(Identity::username),
            Some("refreshed-user")
        );
        assert_eq!(provider.refreshes(), 1);

        let stored = TokenStore::new(storage.as_ref()).load().unwrap().unwrap();
        assert_eq!(stored.refresh_token(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn bootstrap_with_rejected_refresh_is_silent() {
        let mut fake = FakeProvider::new(live_tokens("kari", "r"));
        fake.refresh_error = Some(ProviderError::TokenEndpoint {
            error: "invalid_grant".to_string(),
            description: Some("Refresh Token has expired".to_string()),
        });
        let provider = Arc::new(fake);
        let storage = seeded_storage(&expired_tokens());
        let manager = manager(&provider, &storage).await;

        let state = manager.auth_state().await;
        assert!(!state.is_authenticated());
        assert_eq!(state.error(), None);
        assert_eq!(storage.get(TOKENS_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn bootstrap_with_unreadable_storage_is_silent() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let manager = SessionManager::initialize(
            provider,
            Arc::new(UnavailableStorage),
            SessionSettings::default(),
        )
        .await;

        let state = manager.auth_state().await;
        assert!(!state.is_authenticated());
        assert_eq!(state.error(), None);
    }

    #[tokio::test]
    async fn sign_in_persists_pkce_context() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;

        let url = manager.sign_in().await.unwrap();
        let state = persisted_state(&storage);
        assert!(url.query_pairs().any(|(k, v)| k == "state" && v == state));
        assert!(storage.get(CODE_VERIFIER_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn sign_in_reports_storage_failure() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let manager = SessionManager::initialize(
            provider,
            Arc::new(UnavailableStorage),
            SessionSettings::default(),
        )
        .await;

        let report = manager.sign_in().await.unwrap_err();
        assert!(matches!(
            report.current_context(),
            AuthenticationError::PersistFailed { .. }
        ));
        assert!(manager.auth_state().await.error().is_some());
    }

    #[tokio::test]
    async fn login_grants_prices_from_scp_claim() {
        let access = token_with(&json!({
            "cognito:username": "azuread_kari",
            "scp": "varekatalog.prices"
        }));
        let provider = Arc::new(FakeProvider::new(
            TokenSet::new(access.clone()).with_refresh_token(Some("r".to_string())),
        ));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;
        let mut screen = CallbackScreen::new();

        manager.sign_in().await.unwrap();
        let state = persisted_state(&storage);
        let outcome = manager
            .handle_callback(&callback(Some("abc123"), Some(&state)))
            .await;
        assert!(screen.settle(outcome));

        assert_eq!(
            screen.status(),
            &CallbackStatus::Success(PostLoginRedirect {
                target: "/".to_string(),
                delay: std::time::Duration::from_secs(2),
            })
        );
        let session = manager.auth_state().await;
        assert!(session.is_authenticated());
        assert_eq!(session.access_token(), Some(access.as_str()));
        assert_eq!(
            session.permissions(),
            PermissionSet::from_scopes(&extract_scopes(&access))
        );
        assert!(session.permissions().can_search());
        assert!(session.permissions().can_view_prices());
        assert!(!session.permissions().can_view_inventory());

        assert_eq!(provider.exchanges(), 1);
        assert_eq!(storage.get(STATE_KEY).unwrap(), None);
        assert_eq!(storage.get(CODE_VERIFIER_KEY).unwrap(), None);
        assert!(storage.get(TOKENS_KEY).unwrap().is_some());
        assert_eq!(
            storage.get(SCOPES_KEY).unwrap().as_deref(),
            Some(r#"["prices"]"#)
        );
    }

    #[tokio::test]
    async fn forged_state_never_reaches_token_endpoint() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;

        manager.sign_in().await.unwrap();
        let result = manager
            .handle_callback(&callback(Some("abc123"), Some("forged")))
            .await;

        assert_eq!(result, Err(CallbackError::StateMismatch));
        assert_eq!(provider.exchanges(), 0);
        assert!(!manager.auth_state().await.is_authenticated());
        assert_eq!(storage.get(STATE_KEY).unwrap(), None);
        assert_eq!(storage.get(CODE_VERIFIER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn callback_without_persisted_state_is_rejected() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;

        let result = manager
            .handle_callback(&callback(Some("abc123"), Some("anything")))
            .await;
        assert_eq!(result, Err(CallbackError::StateMismatch));
        assert_eq!(provider.exchanges(), 0);
    }

    #[tokio::test]
    async fn provider_error_shows_description() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;

        manager.sign_in().await.unwrap();
        let params =
            CallbackParams::from_query("error=access_denied&error_description=User+cancelled");
        let error = manager.handle_callback(&params).await.unwrap_err();

        assert_eq!(error.to_string(), "User cancelled");
        assert_eq!(provider.exchanges(), 0);
        assert_eq!(storage.get(STATE_KEY).unwrap(), None);
        assert_eq!(storage.get(CODE_VERIFIER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn missing_code_is_rejected() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;

        manager.sign_in().await.unwrap();
        let state = persisted_state(&storage);
        let result = manager.handle_callback(&callback(None, Some(&state))).await;

        assert_eq!(result, Err(CallbackError::MissingCode));
        assert_eq!(provider.exchanges(), 0);
    }

    #[tokio::test]
    async fn missing_verifier_is_rejected() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;

        storage.set(STATE_KEY, "nonce").unwrap();
        let result = manager
            .handle_callback(&callback(Some("abc123"), Some("nonce")))
            .await;

        assert_eq!(result, Err(CallbackError::MissingVerifier));
        assert_eq!(provider.exchanges(), 0);
    }

    #[tokio::test]
    async fn exchange_failure_surfaces_provider_description() {
        let mut fake = FakeProvider::new(live_tokens("kari", "r"));
        fake.exchange_error = Some(ProviderError::TokenEndpoint {
            error: "invalid_grant".to_string(),
            description: Some("Authorization code has expired".to_string()),
        });
        let provider = Arc::new(fake);
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;

        manager.sign_in().await.unwrap();
        let state = persisted_state(&storage);
        let error = manager
            .handle_callback(&callback(Some("stale"), Some(&state)))
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "Authorization code has expired");
        assert_eq!(storage.get(CODE_VERIFIER_KEY).unwrap(), None);
        assert!(!manager.auth_state().await.is_authenticated());
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_round_trip() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = seeded_storage(&live_tokens("ola", "refresh-1"));
        let manager = manager(&provider, &storage).await;

        let (a, b, c, d) = tokio::join!(
            manager.refresh_session(),
            manager.refresh_session(),
            manager.refresh_session(),
            manager.refresh_session(),
        );

        assert_eq!(provider.refreshes(), 1);
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, d);
        assert_eq!(
            manager.auth_state().await.access_token(),
            Some(provider.refreshed.access_token())
        );
    }

    #[tokio::test]
    async fn login_wins_over_refresh_in_flight() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "refresh-k")));
        let storage = seeded_storage(&live_tokens("ola", "refresh-1"));
        let manager = manager(&provider, &storage).await;

        manager.sign_in().await.unwrap();
        let params = callback(Some("abc123"), Some(&persisted_state(&storage)));
        let (refreshed, login) = tokio::join!(manager.refresh_session(), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            manager.handle_callback(&params).await
        });

        assert!(refreshed.is_some());
        assert!(login.is_ok());
        let state = manager.auth_state().await;
        assert_eq!(state.identity().map(Identity::username), Some("kari"));
        let stored = TokenStore::new(storage.as_ref()).load().unwrap().unwrap();
        assert_eq!(stored.refresh_token(), Some("refresh-k"));

        // Queued callers see the login, not a stale refresh.
        assert_eq!(
            manager.get_access_token().await.as_deref(),
            Some(provider.exchanged.access_token())
        );
        assert_eq!(provider.refreshes(), 1);
    }

    #[tokio::test]
    async fn sequential_refreshes_each_reach_provider() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = seeded_storage(&live_tokens("ola", "refresh-1"));
        let manager = manager(&provider, &storage).await;

        manager.refresh_session().await.unwrap();
        manager.refresh_session().await.unwrap();
        assert_eq!(provider.refreshes(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_resets_session() {
        let mut fake = FakeProvider::new(live_tokens("kari", "r"));
        fake.refresh_error = Some(ProviderError::TokenEndpoint {
            error: "invalid_grant".to_string(),
            description: None,
        });
        let provider = Arc::new(fake);
        let storage = seeded_storage(&live_tokens("ola", "refresh-1"));
        let manager = manager(&provider, &storage).await;

        assert_eq!(manager.refresh_session().await, None);

        let state = manager.auth_state().await;
        assert!(!state.is_authenticated());
        assert!(!state.is_loading());
        assert_eq!(state.access_token(), None);
        assert_eq!(state.error(), Some("Session refresh failed: invalid_grant"));
        assert_eq!(storage.get(TOKENS_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn access_token_requires_session() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager(&provider, &storage).await;

        assert_eq!(manager.get_access_token().await, None);
        assert_eq!(provider.refreshes(), 0);
    }

    #[tokio::test]
    async fn live_access_token_is_returned_as_is() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let tokens = live_tokens("ola", "refresh-1");
        let storage = seeded_storage(&tokens);
        let manager = manager(&provider, &storage).await;

        assert_eq!(
            manager.get_access_token().await.as_deref(),
            Some(tokens.access_token())
        );
        assert_eq!(provider.refreshes(), 0);
    }

    #[tokio::test]
    async fn expiring_access_token_is_refreshed() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let tokens = live_tokens("ola", "refresh-1");
        let storage = seeded_storage(&tokens);
        let manager = manager(&provider, &storage).await;

        // Expires inside the 60 s leeway.
        let expiring = tokens.with_expires_in(Duration::seconds(30));
        TokenStore::new(storage.as_ref())
            .save(&expiring, &extract_scopes(expiring.access_token()))
            .unwrap();

        assert_eq!(
            manager.get_access_token().await.as_deref(),
            Some(provider.refreshed.access_token())
        );
        assert_eq!(provider.refreshes(), 1);
    }

    #[tokio::test]
    async fn sign_out_clears_everything() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let storage = seeded_storage(&live_tokens("ola", "refresh-1"));
        let manager = manager(&provider, &storage).await;
        manager.sign_in().await.unwrap();

        let url = manager.sign_out().await;

        assert_eq!(url.path(), "/logout");
        for key in ALL_KEYS {
            assert_eq!(storage.get(key).unwrap(), None, "{key} left behind");
        }
        let state = manager.auth_state().await;
        assert!(!state.is_authenticated());
        assert_eq!(state.permissions(), PermissionSet::public());
    }

    #[tokio::test]
    async fn sign_out_survives_storage_failure() {
        let provider = Arc::new(FakeProvider::new(live_tokens("kari", "r")));
        let manager = SessionManager::initialize(
            provider.clone(),
            Arc::new(UnavailableStorage),
            SessionSettings::default(),
        )
        .await;

        let url = manager.sign_out().await;
        assert_eq!(url, provider.logout_url());
        assert!(!manager.auth_state().await.is_authenticated());
    }
}
