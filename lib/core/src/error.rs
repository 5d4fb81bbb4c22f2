//! Error handling foundation.
//!
//! Only the `Result` alias lives here. Each crate keeps its own error enums
//! and wraps them in a rootcause `Report` where the failure crosses a
//! network or storage boundary.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
