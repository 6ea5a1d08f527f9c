//! dashcheck CLI
//!
//! Loads `dashcheck.toml`, registers the scenario files it points at and
//! runs them in headless Chromium.

pub mod commands;
pub mod config;
pub mod output;

pub use config::{Config, DEFAULT_CONFIG_FILE};
