//! Shared utilities for the decode pipeline.

pub mod error;

pub use error::{DecodeError, Result};
