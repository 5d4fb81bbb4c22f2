//! Test doubles shared by the route and registry tests.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;
use varekatalog_auth::{IdentityProvider, PkceContext, ProviderError, TokenSet};
use varekatalog_core::Result;

/// Builds an unsigned JWT carrying `payload`.
pub fn token_with(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

/// Identity provider that hands out a fixed access token.
pub struct FakeProvider {
    access_token: String,
    exchanges: AtomicUsize,
}

impl FakeProvider {
    pub fn with_access_token(access_token: String) -> Self {
        Self {
            access_token,
            exchanges: AtomicUsize::new(0),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::with_access_token(token_with(&serde_json::json!({"username": "ola"})))
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

    async fn exchange_code(&self, _code: &str, _verifier: &str) -> Result<TokenSet, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(TokenSet::new(self.access_token.clone()).with_refresh_token(Some("refresh".into())))
    }

    async fn refresh(&self, _current: &TokenSet) -> Result<TokenSet, ProviderError> {
        Err(ProviderError::NoRefreshToken.into())
    }

    fn logout_url(&self) -> Url {
        Url::parse("https://login.example.com/logout?client_id=katalog-web").unwrap()
    }
}
