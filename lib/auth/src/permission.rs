//! Capability flags the catalog UI uses to decide what to show.

use serde::Serialize;

use crate::scope::{GrantedScope, ScopeSet};

/// What the current visitor may see.
///
/// Searching is public; prices and stock levels are masked unless the
/// matching scope was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    can_search: bool,
    can_view_prices: bool,
    can_view_inventory: bool,
}

impl PermissionSet {
    /// Permissions of an anonymous visitor.
    #[must_use]
    pub const fn public() -> Self {
        Self {
            can_search: true,
            can_view_prices: false,
            can_view_inventory: false,
        }
    }

    /// Maps granted scopes to capabilities.
    #[must_use]
    pub fn from_scopes(scopes: &ScopeSet) -> Self {
        Self {
            can_search: true,
            can_view_prices: scopes.contains(GrantedScope::Prices),
            can_view_inventory: scopes.contains(GrantedScope::Inventory),
        }
    }

    /// Always true.
    #[must_use]
    pub const fn can_search(&self) -> bool {
        self.can_search
    }

    /// Returns true if prices may be shown.
    #[must_use]
    pub const fn can_view_prices(&self) -> bool {
        self.can_view_prices
    }

    /// Returns true if stock levels may be shown.
    #[must_use]
    pub const fn can_view_inventory(&self) -> bool {
        self.can_view_inventory
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::public()
    }
}
