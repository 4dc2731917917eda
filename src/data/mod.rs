//! External data access.
//!
//! - World Bank indicator API connector + paged fetcher (`worldbank`)

pub mod worldbank;

pub use worldbank::*;
