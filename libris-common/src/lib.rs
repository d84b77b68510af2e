//! # Libris Common Library
//!
//! Shared code for the libris metadata crates including:
//! - Error type used across crate boundaries
//! - Configuration loading (TOML, environment, compiled defaults)
//! - Logging bootstrap
//! - SQLite database initialisation

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
