//! Utilities
//!
//! Common utilities used throughout the runner.

pub mod error;

pub use error::*;
