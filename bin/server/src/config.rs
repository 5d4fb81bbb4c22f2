//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`OAuthConfig`](varekatalog_auth::OAuthConfig) for the identity
//! provider settings, e.g. `OAUTH__DOMAIN` and `OAUTH__CLIENT_ID`.

use serde::Deserialize;
use std::time::Duration;
use varekatalog_auth::{OAuthConfig, SessionSettings};

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// OAuth identity provider configuration.
    pub oauth: OAuthConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Tokens expiring within this many seconds are refreshed before use.
    #[serde(default = "default_refresh_leeway_seconds")]
    pub refresh_leeway_seconds: i64,

    /// Delay before the callback page navigates on, in milliseconds.
    #[serde(default = "default_redirect_delay_ms")]
    pub redirect_delay_ms: u64,

    /// Where the callback page navigates after a successful login.
    #[serde(default = "default_post_login_redirect")]
    pub post_login_redirect: String,

    /// Browser sessions unused for this many minutes are dropped.
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
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

fn default_idle_timeout_minutes() -> u64 {
    60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_leeway_seconds: default_refresh_leeway_seconds(),
            redirect_delay_ms: default_redirect_delay_ms(),
            post_login_redirect: default_post_login_redirect(),
            idle_timeout_minutes: default_idle_timeout_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl SessionConfig {
    /// Settings handed to every browser's session manager.
    #[must_use]
    pub fn manager_settings(&self) -> SessionSettings {
        SessionSettings {
            refresh_leeway_seconds: self.refresh_leeway_seconds,
            redirect_delay_ms: self.redirect_delay_ms,
            post_login_redirect: self.post_login_redirect.clone(),
        }
    }

    /// How long a browser session may sit unused.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_minutes * 60)
    }

    /// Period of the idle-session sweep.
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
