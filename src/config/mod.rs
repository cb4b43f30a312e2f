//! Configuration module.
//!
//! Provides [`DetectorConfig`] (detector settings with documented defaults),
//! [`DetectorConfigBuilder`] for programmatic overrides, [`AppConfig`] (the
//! `settings.toml` root) and [`AppPaths`] for cross-platform directories.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, ConfigError, DetectorConfig, DetectorConfigBuilder, DetectorMode, FormantRange,
    FormantTable, HysteresisConfig,
};
