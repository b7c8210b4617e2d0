//! # AquaWatch Common Library
//!
//! Shared code for the AquaWatch services:
//! - Error type and result alias
//! - Configuration loading (TOML bootstrap file, environment overrides, defaults)
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
