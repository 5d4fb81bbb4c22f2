//! Shared foundation for the varekatalog front-end crates.
//!
//! Holds the `Result` alias used at fallible boundaries and the identifier
//! that keys a browser's authentication session on the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ClientSessionId, ParseIdError};
