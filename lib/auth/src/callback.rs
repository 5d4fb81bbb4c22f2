//! The OAuth callback route: query parameters and screen state.
//!
//! The callback screen starts in `Processing` and settles exactly once into
//! `Success` or `Error`. Only a full navigation leaves a settled screen.

use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::CallbackError;

/// Query parameters the identity provider sends back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parses a raw query string, with or without the leading `?`.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let slot = match &*key {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        params.normalized()
    }

    /// Reads the parameters from a full callback URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or_default())
    }

    /// Treats empty values as absent.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn present(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }
        Self {
            code: present(self.code),
            state: present(self.state),
            error: present(self.error),
            error_description: present(self.error_description),
        }
    }
}

/// Where to send the browser after a successful login, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostLoginRedirect {
    pub target: String,
    pub delay: Duration,
}

/// State of the callback screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
    Processing,
    Success(PostLoginRedirect),
    Error(CallbackError),
}

/// The callback screen's state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackScreen {
    status: CallbackStatus,
}

impl CallbackScreen {
    /// A screen that has not settled yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: CallbackStatus::Processing,
        }
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> &CallbackStatus {
        &self.status
    }

    /// Returns true once the screen reached `Success` or `Error`.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self.status, CallbackStatus::Processing)
    }

    /// Settles the screen with the result of the callback.
    ///
    /// Returns false and changes nothing if the screen already settled.
    pub fn settle(&mut self, outcome: Result<PostLoginRedirect, CallbackError>) -> bool {
        if self.is_settled() {
            return false;
        }
        self.status = match outcome {
            Ok(redirect) => CallbackStatus::Success(redirect),
            Err(error) => CallbackStatus::Error(error),
        };
        true
    }
}

impl Default for CallbackScreen {
    fn default() -> Self {
        Self::new()
    }
}
