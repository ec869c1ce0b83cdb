//! Common utilities and types shared across the standby promoter crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::LogFormat;
