//! # feedmirror common library
//!
//! Shared code for the feedmirror service crates:
//! - Error type and result alias
//! - Bootstrap configuration (TOML + environment)
//! - SQLite schema initialization and row models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
