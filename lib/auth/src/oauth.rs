//! Hosted-login identity provider backed by the oauth2 crate.
//!
//! Talks to the authorization, token and logout endpoints of an AWS Cognito
//! style hosted domain as a public client: PKCE instead of a client secret.

use async_trait::async_trait;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    ExtraTokenFields, HttpClientError, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    RefreshToken, RequestTokenError, Scope, StandardRevocableToken, StandardTokenResponse,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;
use varekatalog_core::Result;

use crate::config::OAuthConfig;
use crate::error::ProviderError;
use crate::pkce::PkceContext;
use crate::provider::IdentityProvider;
use crate::token::TokenSet;

/// Token response fields beyond RFC 6749 that the hosted domain returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

type HostedTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type HostedClient<HasAuthUrl = EndpointSet, HasTokenUrl = EndpointSet> = Client<
    BasicErrorResponse,
    HostedTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    HasAuthUrl,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    HasTokenUrl,
>;

type TokenRequestError = RequestTokenError<HttpClientError<reqwest::Error>, BasicErrorResponse>;

/// OAuth 2.0 public client for the hosted login domain.
pub struct OAuthProvider {
    client: HostedClient,
    http: reqwest::Client,
    config: OAuthConfig,
    logout_url: Url,
}

impl OAuthProvider {
    /// Creates the provider and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if an endpoint URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: OAuthConfig) -> Result<Self, ProviderError> {
        let auth_url = AuthUrl::new(config.authorize_url())
            .map_err(|e| configuration(format!("invalid authorization URL: {e}")))?;
        let token_url = TokenUrl::new(config.token_url())
            .map_err(|e| configuration(format!("invalid token URL: {e}")))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri().to_string())
            .map_err(|e| configuration(format!("invalid redirect URI: {e}")))?;

        let client_id = ClientId::new(config.client_id().to_string());
        let client = HostedClient::<EndpointNotSet, EndpointNotSet>::new(client_id)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| configuration(format!("failed to create HTTP client: {e}")))?;

        let logout_url = Url::parse_with_params(
            &config.logout_url(),
            &[
                ("client_id", config.client_id()),
                ("logout_uri", config.post_logout_redirect_uri()),
                ("post_logout_redirect_uri", config.post_logout_redirect_uri()),
            ],
        )
        .map_err(|e| configuration(format!("invalid logout URL: {e}")))?;

        Ok(Self {
            client,
            http,
            config,
            logout_url,
        })
    }

    /// Returns the configuration this provider was built from.
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn authorization_url(&self, pkce: &PkceContext) -> Url {
        let verifier = PkceCodeVerifier::new(pkce.code_verifier().to_string());
        let state = pkce.state().to_string();

        let mut request = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .set_pkce_challenge(PkceCodeChallenge::from_code_verifier_sha256(&verifier));

        for scope in self.config.scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        if let Some(provider) = self.config.identity_provider() {
            request = request.add_extra_param("identity_provider", provider);
        }
        if let Some(prompt) = self.config.prompt() {
            request = request.add_extra_param("prompt", prompt);
        }

        let (url, _) = request.url();
        url
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, ProviderError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(code_verifier.to_string()))
            .request_async(&self.http)
            .await
            .map_err(token_error)?;

        debug!(
            has_refresh_token = response.refresh_token().is_some(),
            has_id_token = response.extra_fields().id_token.is_some(),
            "authorization code exchanged"
        );
        Ok(token_set(&response))
    }

    #[instrument(skip_all)]
    async fn refresh(&self, current: &TokenSet) -> Result<TokenSet, ProviderError> {
        let refresh_token = current
            .refresh_token()
            .ok_or(ProviderError::NoRefreshToken)?;

        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(token_error)?;

        debug!(
            rotated = response.refresh_token().is_some(),
            "tokens refreshed"
        );
        Ok(token_set(&response).inherit_from(current))
    }

    fn logout_url(&self) -> Url {
        self.logout_url.clone()
    }
}

fn configuration(reason: String) -> ProviderError {
    ProviderError::Configuration { reason }
}

fn token_set(response: &HostedTokenResponse) -> TokenSet {
    let tokens = TokenSet::new(response.access_token().secret().clone())
        .with_refresh_token(response.refresh_token().map(|t| t.secret().clone()))
        .with_id_token(response.extra_fields().id_token.clone());

    match response
        .expires_in()
        .and_then(|lifetime| chrono::Duration::from_std(lifetime).ok())
    {
        Some(lifetime) => tokens.with_expires_in(lifetime),
        None => tokens,
    }
}

fn token_error(err: TokenRequestError) -> ProviderError {
    match err {
        RequestTokenError::ServerResponse(response) => ProviderError::TokenEndpoint {
            error: response.error().to_string(),
            description: response.error_description().cloned(),
        },
        RequestTokenError::Request(HttpClientError::Reqwest(e)) if e.is_timeout() => {
            warn!("token endpoint timed out");
            ProviderError::Timeout
        }
        RequestTokenError::Request(e) => ProviderError::Network {
            reason: e.to_string(),
        },
        RequestTokenError::Parse(e, _) => ProviderError::MalformedResponse {
            reason: e.to_string(),
        },
        RequestTokenError::Other(reason) => ProviderError::MalformedResponse { reason },
    }
}
