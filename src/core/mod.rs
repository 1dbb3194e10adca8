//! # Core Module
//!
//! Configuration and error types shared by the whole crate.

pub mod config;
pub mod error;

pub use config::{BotConfig, BotConfiguration, BotFeatures};
pub use error::{Error, Result};
