//! Shared error definitions and utilities used across all digger crates.

pub mod error;

pub use error::{Error, FromMessage, Result};
