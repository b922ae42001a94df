// src/utils/mod.rs
//! Shared utilities: error types and configuration loading

pub mod config;
pub mod errors;

pub use self::config::RecorderConfig;
pub use self::errors::{RecorderError, Result};
