//! Unverified JWT payload decoding.
//!
//! Tokens are issued to us over TLS by the identity provider and only read
//! for display and capability gating, so signatures are not checked here.
//! The backend API validates the bearer token on every call.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// Standard base64 with optional padding and lenient trailing bits; payloads
/// are mapped from the URL-safe alphabet before decoding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Why a token payload could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    /// Not three dot-separated segments.
    Structure { segments: usize },
    /// Payload segment is not base64url.
    Encoding(String),
    /// Payload is not a JSON object.
    Json(String),
}

impl fmt::Display for ClaimsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structure { segments } => {
                write!(f, "expected 3 token segments, found {segments}")
            }
            Self::Encoding(reason) => write!(f, "payload is not base64url: {reason}"),
            Self::Json(reason) => write!(f, "payload is not a JSON object: {reason}"),
        }
    }
}

impl std::error::Error for ClaimsError {}

/// Decodes the claims object of a compact JWT.
///
/// # Errors
///
/// Returns a `ClaimsError` describing the first malformed part.
pub fn decode_claims(token: &str) -> Result<Map<String, Value>, ClaimsError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ClaimsError::Structure {
            segments: parts.len(),
        });
    }

    let payload: String = parts[1]
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    let bytes = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|e| ClaimsError::Encoding(e.to_string()))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(other) => Err(ClaimsError::Json(format!("found {}", json_kind(&other)))),
        Err(e) => Err(ClaimsError::Json(e.to_string())),
    }
}

/// Reads the `exp` claim as a UTC timestamp.
#[must_use]
pub fn expiry(claims: &Map<String, Value>) -> Option<DateTime<Utc>> {
    claims
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
}

/// Returns the first of `names` that is present as a non-empty string claim.
#[must_use]
pub fn first_string<'a>(claims: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| claims.get(*name).and_then(Value::as_str))
        .find(|value| !value.is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
