//! Identity-provider and session configuration.
//!
//! `OAuthConfig` describes the hosted login domain (AWS Cognito hosted UI,
//! optionally brokering Azure AD) and the public client registered there.
//! `SessionSettings` tunes the session manager itself.
//!
//! Fields with defaults can be omitted when loading from environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the OAuth 2.0 public client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Base URL of the hosted login domain (e.g. "https://login.example.auth.eu-north-1.amazoncognito.com").
    domain: String,
    /// The OAuth2 client ID. Public client: there is no secret.
    client_id: String,
    /// Absolute URL of this application's callback route.
    redirect_uri: String,
    /// Where the provider sends the browser after logout.
    post_logout_redirect_uri: String,
    /// Scopes to request as a comma-separated string.
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Path of the authorization endpoint below `domain`.
    #[serde(default = "default_authorize_path")]
    authorize_path: String,
    /// Path of the token endpoint below `domain`.
    #[serde(default = "default_token_path")]
    token_path: String,
    /// Path of the logout endpoint below `domain`.
    #[serde(default = "default_logout_path")]
    logout_path: String,
    /// Routes the login through a federated provider (e.g. "AzureAD").
    #[serde(default)]
    identity_provider: Option<String>,
    /// Optional `prompt` hint (e.g. "login", "select_account").
    #[serde(default)]
    prompt: Option<String>,
    /// Timeout for calls to the token endpoint, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    request_timeout_seconds: u64,
}

fn default_scopes() -> String {
    "openid,email,profile,varekatalog/prices,varekatalog/inventory".to_string()
}

fn default_authorize_path() -> String {
    "/oauth2/authorize".to_string()
}

fn default_token_path() -> String {
    "/oauth2/token".to_string()
}

fn default_logout_path() -> String {
    "/logout".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

impl OAuthConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(
        domain: String,
        client_id: String,
        redirect_uri: String,
        post_logout_redirect_uri: String,
    ) -> Self {
        Self {
            domain,
            client_id,
            redirect_uri,
            post_logout_redirect_uri,
            scopes: default_scopes(),
            authorize_path: default_authorize_path(),
            token_path: default_token_path(),
            logout_path: default_logout_path(),
            identity_provider: None,
            prompt: None,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(
        domain: String,
        client_id: String,
        redirect_uri: String,
        post_logout_redirect_uri: String,
    ) -> OAuthConfigBuilder {
        OAuthConfigBuilder::new(OAuthConfig::new(
            domain,
            client_id,
            redirect_uri,
            post_logout_redirect_uri,
        ))
    }

    /// Returns the hosted login domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the callback URL.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Returns the post-logout landing URL.
    #[must_use]
    pub fn post_logout_redirect_uri(&self) -> &str {
        &self.post_logout_redirect_uri
    }

    /// Returns the scopes to request, parsed from the comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Full URL of the authorization endpoint.
    #[must_use]
    pub fn authorize_url(&self) -> String {
        self.endpoint(&self.authorize_path)
    }

    /// Full URL of the token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        self.endpoint(&self.token_path)
    }

    /// Full URL of the logout endpoint (without query parameters).
    #[must_use]
    pub fn logout_url(&self) -> String {
        self.endpoint(&self.logout_path)
    }

    /// Returns the federated identity-provider hint, if any.
    #[must_use]
    pub fn identity_provider(&self) -> Option<&str> {
        self.identity_provider.as_deref()
    }

    /// Returns the `prompt` hint, if any.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Timeout applied to token endpoint calls.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.domain.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Builder for `OAuthConfig`.
#[derive(Debug)]
pub struct OAuthConfigBuilder {
    config: OAuthConfig,
    scopes: Vec<String>,
}

impl OAuthConfigBuilder {
    fn new(config: OAuthConfig) -> Self {
        let scopes = config.scopes().into_iter().map(str::to_string).collect();
        Self { config, scopes }
    }

    /// Replaces the requested scopes.
    #[must_use]
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Adds a scope unless it is already requested.
    #[must_use]
    pub fn add_scope(mut self, scope: String) -> Self {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Routes the login through a federated identity provider.
    #[must_use]
    pub fn identity_provider(mut self, provider: String) -> Self {
        self.config.identity_provider = Some(provider);
        self
    }

    /// Sets the `prompt` hint.
    #[must_use]
    pub fn prompt(mut self, prompt: String) -> Self {
        self.config.prompt = Some(prompt);
        self
    }

    /// Overrides the authorization endpoint path.
    #[must_use]
    pub fn authorize_path(mut self, path: String) -> Self {
        self.config.authorize_path = path;
        self
    }

    /// Overrides the token endpoint path.
    #[must_use]
    pub fn token_path(mut self, path: String) -> Self {
        self.config.token_path = path;
        self
    }

    /// Overrides the logout endpoint path.
    #[must_use]
    pub fn logout_path(mut self, path: String) -> Self {
        self.config.logout_path = path;
        self
    }

    /// Sets the token endpoint timeout.
    #[must_use]
    pub fn request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.request_timeout_seconds = seconds;
        self
    }

    /// Builds the `OAuthConfig`.
    #[must_use]
    pub fn build(self) -> OAuthConfig {
        OAuthConfig {
            scopes: self.scopes.join(","),
            ..self.config
        }
    }
}

/// Tuning for the session manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Tokens expiring within this many seconds are refreshed before use.
    #[serde(default = "default_refresh_leeway_seconds")]
    pub refresh_leeway_seconds: i64,

    /// Delay before the callback screen navigates to the application.
    #[serde(default = "default_redirect_delay_ms")]
    pub redirect_delay_ms: u64,

    /// Where the callback screen navigates after a successful login.
    #[serde(default = "default_post_login_redirect")]
    pub post_login_redirect: String,
}

fn default_refresh_leeway_seconds() -> i64 {
    60
}

fn default_redirect_delay_ms() -> u64 {
    2000
}

fn default_post_login_redirect() -> String {
    "/".to_string()
}

impl SessionSettings {
    /// Refresh leeway as a chrono duration.
    #[must_use]
    pub fn refresh_leeway(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_leeway_seconds)
    }

    /// Post-login redirect delay.
    #[must_use]
    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_leeway_seconds: default_refresh_leeway_seconds(),
            redirect_delay_ms: default_redirect_delay_ms(),
            post_login_redirect: default_post_login_redirect(),
        }
    }
}
