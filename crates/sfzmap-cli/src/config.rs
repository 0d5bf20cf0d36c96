//! Configuration file support for sfzmap
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/sfzmap/config.toml`
//! - macOS: `~/Library/Application Support/sfzmap/config.toml`
//! - Windows: `%APPDATA%\sfzmap\config.toml`
//!
//! A different file can be given with `--config`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sfzmap::parser::DEFAULT_MAX_INCLUDE_DEPTH;
use sfzmap::PreprocessOptions;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output file settings
    pub output: OutputSettings,
    /// Preprocessor settings
    pub preprocess: PreprocessSettings,
}

/// Output file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Pretty-print the JSON output
    pub pretty: bool,
    /// Extension of the output files, without the dot
    pub extension: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            pretty: false,
            extension: "json".to_string(),
        }
    }
}

/// Preprocessor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Deepest allowed `#include` nesting
    pub max_include_depth: usize,
    /// Fallback directory for includes; defaults to the directory of each
    /// converted file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            root_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicitly given file must exist; a missing default file yields the
    /// default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    log::debug!("No config file at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        ProjectDirs::from("", "", "sfzmap")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .context("Could not determine config directory")
    }

    /// Preprocessor options for the compiler
    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            root_dir: self.preprocess.root_dir.clone(),
            max_include_depth: self.preprocess.max_include_depth,
        }
    }

    /// Output extension without a leading dot
    pub fn output_extension(&self) -> &str {
        self.output.extension.trim_start_matches('.')
    }

    /// Write a default config file with comments to `path`
    pub fn write_default_config_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

const DEFAULT_CONFIG: &str = r#"# sfzmap configuration file
# https://github.com/trusch/sfzmap

[output]
# Pretty-print the generated JSON
pretty = false

# Extension of the generated files (piano.sfz -> piano.json)
extension = "json"

[preprocess]
# Deepest allowed #include nesting
max_include_depth = 64

# Directory searched for includes that are not found next to the including
# file. Defaults to the directory of the converted file.
# root_dir = "/path/to/instruments"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file_matches_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str("[output]\npretty = true\n").unwrap();
        assert!(config.output.pretty);
        assert_eq!(config.output.extension, "json");
        assert_eq!(config.preprocess.max_include_depth, DEFAULT_MAX_INCLUDE_DEPTH);
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.output.extension = ".map".to_string();
        config.preprocess.root_dir = Some(PathBuf::from("/instruments"));
        config.preprocess.max_include_depth = 8;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.output_extension(), "map");

        let options = parsed.preprocess_options();
        assert_eq!(options.root_dir, Some(PathBuf::from("/instruments")));
        assert_eq!(options.max_include_depth, 8);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfzmap.toml");

        assert!(Config::load(Some(&path)).is_err());

        Config::write_default_config_file(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), Config::default());
    }
}
