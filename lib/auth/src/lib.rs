//! Authentication session management for the varekatalog front end.
//!
//! This crate provides:
//! - The OAuth 2.0 authorization-code flow with PKCE for a public client
//!   (`SessionManager::sign_in`, `SessionManager::handle_callback`)
//! - Session bootstrap, coalesced refresh and logout (`SessionManager`)
//! - Token persistence in tab-scoped storage (`TokenStore`, `SessionStorage`)
//! - Scope extraction from access tokens (`extract_scopes`)
//! - Capability flags derived from scopes (`PermissionSet`)
//!
//! # Access Model
//!
//! Searching the catalog is public. Prices and inventory are gated by the
//! `varekatalog.prices` and `varekatalog.inventory` scopes granted in the
//! access token. The gating here only drives the UI; the catalog API
//! enforces the same scopes on its own.
//!
//! # Example
//!
//! ```
//! use varekatalog_auth::{GrantedScope, PermissionSet, ScopeSet};
//!
//! let scopes = ScopeSet::parse("openid email varekatalog/prices");
//! assert!(scopes.contains(GrantedScope::Prices));
//!
//! let permissions = PermissionSet::from_scopes(&scopes);
//! assert!(permissions.can_search());
//! assert!(permissions.can_view_prices());
//! assert!(!permissions.can_view_inventory());
//! ```

pub mod callback;
pub mod claims;
pub mod config;
pub mod error;
pub mod identity;
pub mod manager;
pub mod oauth;
pub mod permission;
pub mod pkce;
pub mod provider;
pub mod scope;
pub mod session;
pub mod storage;
pub mod token;

// Re-export main types at crate root
pub use callback::{CallbackParams, CallbackScreen, CallbackStatus, PostLoginRedirect};
pub use config::{OAuthConfig, OAuthConfigBuilder, SessionSettings};
pub use error::{AuthenticationError, CallbackError, ProviderError, StorageError};
pub use identity::Identity;
pub use manager::SessionManager;
pub use oauth::OAuthProvider;
pub use permission::PermissionSet;
pub use pkce::{PendingAuthorization, PkceContext};
pub use provider::IdentityProvider;
pub use scope::{GrantedScope, ScopeSet, UnknownScope, extract_scopes};
pub use session::AuthState;
pub use storage::{MemoryStorage, SessionStorage};
pub use token::{TokenSet, TokenStore};
