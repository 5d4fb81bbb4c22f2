//! Granted premium scopes and their extraction from access tokens.
//!
//! Only two scopes matter to the catalog: seeing prices and seeing stock
//! levels. Anything else a token carries is ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::claims;

/// A premium capability granted by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantedScope {
    /// `varekatalog.prices`: list and net prices are visible.
    Prices,
    /// `varekatalog.inventory`: stock levels are visible.
    Inventory,
}

impl GrantedScope {
    /// Canonical dotted identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prices => "varekatalog.prices",
            Self::Inventory => "varekatalog.inventory",
        }
    }
}

impl fmt::Display for GrantedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantedScope {
    type Err = UnknownScope;

    /// Accepts `varekatalog.prices` and `varekatalog/prices` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('/', ".").as_str() {
            "varekatalog.prices" => Ok(Self::Prices),
            "varekatalog.inventory" => Ok(Self::Inventory),
            _ => Err(UnknownScope(s.to_string())),
        }
    }
}

/// A scope string that is not one of the catalog scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownScope(pub String);

impl fmt::Display for UnknownScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown scope '{}'", self.0)
    }
}

impl std::error::Error for UnknownScope {}

/// Set of granted scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet {
    scopes: BTreeSet<GrantedScope>,
}

impl ScopeSet {
    /// The empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Keeps the known scopes from a whitespace-delimited scope string.
    #[must_use]
    pub fn parse(scope_string: &str) -> Self {
        scope_string
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    /// Returns true if `scope` is granted.
    #[must_use]
    pub fn contains(&self, scope: GrantedScope) -> bool {
        self.scopes.contains(&scope)
    }

    /// Returns true if nothing is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Iterates the granted scopes in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = GrantedScope> + '_ {
        self.scopes.iter().copied()
    }
}

impl FromIterator<GrantedScope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = GrantedScope>>(iter: I) -> Self {
        Self {
            scopes: iter.into_iter().collect(),
        }
    }
}

/// Derives the granted scopes from a raw access token.
///
/// Total: malformed tokens, bad encodings and unknown scopes all degrade to
/// fewer (possibly zero) scopes.
#[must_use]
pub fn extract_scopes(access_token: &str) -> ScopeSet {
    match claims::decode_claims(access_token) {
        Ok(claims) => scopes_from_claims(&claims),
        Err(e) => {
            tracing::debug!(error = %e, "could not read access token claims, granting no scopes");
            ScopeSet::empty()
        }
    }
}

/// Reads `scope` (space-delimited string) or `scp` (string or array).
fn scopes_from_claims(claims: &Map<String, Value>) -> ScopeSet {
    let raw = claims.get("scope").or_else(|| claims.get("scp"));
    match raw {
        Some(Value::String(s)) => ScopeSet::parse(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .flat_map(str::split_whitespace)
            .filter_map(|s| s.parse().ok())
            .collect(),
        _ => ScopeSet::empty(),
    }
}
