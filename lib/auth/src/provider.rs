//! The identity-provider seam.
//!
//! `SessionManager` talks to the hosted login domain only through this
//! trait, so tests can swap in a double that never touches the network.

use async_trait::async_trait;
use url::Url;
use varekatalog_core::Result;

use crate::error::ProviderError;
use crate::pkce::PkceContext;
use crate::token::TokenSet;

/// An OAuth 2.0 authorization server serving a public client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Builds the authorization URL carrying the PKCE challenge and state.
    fn authorization_url(&self, pkce: &PkceContext) -> Url;

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the token endpoint rejects the code or cannot be reached.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, ProviderError>;

    /// Obtains fresh tokens with the refresh token held in `current`.
    ///
    /// The returned set keeps the previous refresh and id tokens when the
    /// provider did not rotate them.
    ///
    /// # Errors
    ///
    /// Returns `NoRefreshToken` if `current` has none, or any token endpoint failure.
    async fn refresh(&self, current: &TokenSet) -> Result<TokenSet, ProviderError>;

    /// URL that ends the session at the provider and returns to the application.
    fn logout_url(&self) -> Url;
}
