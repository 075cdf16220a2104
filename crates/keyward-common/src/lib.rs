//! # keyward-common
//!
//! Shared types, configuration, error handling, and token inspection used by
//! the Keyward client and CLI. No I/O beyond loading configuration.

pub mod claims;
pub mod config;
pub mod error;
pub mod models;
pub mod validation;
