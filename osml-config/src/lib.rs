//! Shared configuration loader for the OSML toolchain.
//!
//! `defaults/osml.default.toml` is embedded into every binary so that docs
//! and runtime behavior stay in sync. Applications layer user-specific files
//! on top of those defaults via [`Loader`] before deserializing into
//! [`OsmlConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/osml.default.toml");

/// Top-level configuration consumed by OSML applications.
#[derive(Debug, Clone, Deserialize)]
pub struct OsmlConfig {
    pub diagnostics: DiagnosticsConfig,
    pub output: OutputConfig,
    pub resources: ResourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsConfig {
    pub max_context_width: usize,
    pub show_warnings: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub default_format: OutputFormat,
}

/// How the CLI renders a parsed graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Tree,
    Json,
    Events,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesConfig {
    pub include_paths: Vec<String>,
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<OsmlConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<OsmlConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(config.diagnostics.max_context_width, 80);
        assert_eq!(config.output.default_format, OutputFormat::Tree);
        assert_eq!(config.resources.include_paths, vec!["."]);
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("output.default_format", "json")
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert_eq!(config.output.default_format, OutputFormat::Json);
    }
}
