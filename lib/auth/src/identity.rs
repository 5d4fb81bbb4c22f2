//! The signed-in user as seen by the UI.

use serde::{Deserialize, Serialize};

use crate::claims;
use crate::token::TokenSet;

/// Claims that may carry a login name, in order of preference.
const USERNAME_CLAIMS: &[&str] = &[
    "cognito:username",
    "username",
    "preferred_username",
    "email",
    "sub",
];

/// Claims that may carry a human-readable name, in order of preference.
const DISPLAY_NAME_CLAIMS: &[&str] = &["name", "email"];

/// Opaque handle on the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    username: String,
    display_name: Option<String>,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(username: String, display_name: Option<String>) -> Self {
        Self {
            username,
            display_name,
        }
    }

    /// Derives the identity from the id token, falling back to the access token.
    ///
    /// Never fails: without any usable claim the username is "unknown".
    #[must_use]
    pub fn from_tokens(tokens: &TokenSet) -> Self {
        let sources: Vec<_> = tokens
            .id_token()
            .into_iter()
            .chain(std::iter::once(tokens.access_token()))
            .filter_map(|token| claims::decode_claims(token).ok())
            .collect();

        let username = sources
            .iter()
            .find_map(|c| claims::first_string(c, USERNAME_CLAIMS))
            .unwrap_or("unknown")
            .to_string();
        let display_name = sources
            .iter()
            .find_map(|c| claims::first_string(c, DISPLAY_NAME_CLAIMS))
            .map(str::to_string);

        Self::new(username, display_name)
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the display name, if the provider sent one.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}
