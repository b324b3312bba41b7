//! Configuration system for the par-global-menu native menu mirror.
//!
//! This crate provides configuration loading, saving, and default values
//! for the global menu mirror. It includes:
//!
//! - The [`MirrorConfig`] struct with feature switches and timing tunables
//! - [`TraceConfig`] debug-trace category switches
//! - YAML persistence under the XDG config directory
//! - `PAR_GLOBAL_MENU_*` environment overrides

pub mod config;
pub mod defaults;
mod error;

pub use config::{ENV_PREFIX, MirrorConfig, TraceConfig};
pub use error::ConfigError;
