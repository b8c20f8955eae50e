#![deny(unsafe_code)]

//! Configuration loading and validation for stylescope.
//!
//! Two kinds of configuration live here:
//!
//! - [`Settings`]: how the editor integration itself behaves (workspace
//!   root, excluded paths, matching strictness, autocomplete options).
//! - [`UserConfig`]: the per-directory style configuration discovered in the
//!   workspace (rules, shortcuts, presets, transformers).

/// Per-directory style configuration files.
pub mod user;

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

pub use user::{
    CONFIG_FILE_NAMES, DynamicRuleConfig, LoadedConfig, TransformerConfig, UserConfig,
    is_config_file_name,
};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub(crate) fn parse(path: &Path, source: toml::de::Error) -> Self {
        Self::Parse {
            path: path.display().to_string(),
            source,
        }
    }
}

/// How partial input is matched against candidate utilities.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Candidates must start with the query.
    #[default]
    Prefix,
    /// Query characters must appear in order anywhere in the candidate.
    Fuzzy,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchType::Prefix => write!(f, "prefix"),
            MatchType::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// Top-level settings for the editor integration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Workspace discovery settings.
    #[serde(default)]
    pub workspace: WorkspaceSettings,

    /// Token matching settings.
    #[serde(default)]
    pub matching: MatchingSettings,

    /// Autocomplete settings.
    #[serde(default)]
    pub autocomplete: AutocompleteSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Workspace discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Workspace root. Relative paths resolve against the settings file's
    /// directory; when absent the caller picks (the CLI uses the cwd).
    #[serde(default)]
    pub root: Option<String>,

    /// Glob patterns for paths that never get a context.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            root: None,
            exclude: default_exclude(),
        }
    }
}

fn default_exclude() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/dist/**",
        "**/.git/**",
        "**/target/**",
        "**/build/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Token matching settings.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MatchingSettings {
    /// Use the annotation/attribute-anchored pattern set instead of the
    /// permissive default one.
    #[serde(default)]
    pub strict: bool,
}

/// Autocomplete settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutocompleteSettings {
    /// Matching mode for suggestions.
    #[serde(default)]
    pub match_type: MatchType,

    /// Maximum suggestions returned per query.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Surface suggestion errors instead of returning no suggestions.
    #[serde(default)]
    pub throw_errors: bool,
}

impl Default for AutocompleteSettings {
    fn default() -> Self {
        Self {
            match_type: MatchType::default(),
            max_items: default_max_items(),
            throw_errors: false,
        }
    }
}

fn default_max_items() -> usize {
    50
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let settings: Settings =
            toml::from_str(&content).map_err(|e| ConfigError::parse(path, e))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(s).map_err(|e| ConfigError::parse(Path::new("<inline>"), e))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.exclude_set()?;

        if self.autocomplete.max_items == 0 {
            return Err(ConfigError::Validation(
                "autocomplete.max_items must be at least 1".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }

    /// Compile `workspace.exclude` into a matcher.
    pub fn exclude_set(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for (i, pattern) in self.workspace.exclude.iter().enumerate() {
            let glob = Glob::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("workspace.exclude[{i}] is not a valid glob: {e}"))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| ConfigError::Validation(format!("workspace.exclude: {e}")))
    }
}
