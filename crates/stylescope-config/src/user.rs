//! Per-directory style configuration.
//!
//! A directory "has configuration" when it contains one of
//! [`CONFIG_FILE_NAMES`]. The file may pull in other files through
//! `extends`; every file read while loading is reported in
//! [`LoadedConfig::sources`] so a file watcher can trigger reloads.
//!
//! ## TOML Example
//!
//! ```toml
//! extends = ["../shared/base.toml"]
//! presets = ["core"]
//!
//! [rules]
//! card = "border-radius: 0.5rem; padding: 1rem;"
//!
//! [[dynamic_rules]]
//! pattern = "^gap-(\\d+)$"
//! css = "gap: calc($1 * 0.25rem);"
//!
//! [shortcuts]
//! btn = "px-4 py-1 rounded"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ConfigError;

/// File names that mark a directory as a configuration directory, in
/// lookup order.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "stylescope.toml",
    "stylescope.config.toml",
    ".stylescope.toml",
];

/// Presets shipped with the built-in engine.
const KNOWN_PRESETS: &[&str] = &["core"];

/// Whether `name` is one of the recognized configuration file names.
pub fn is_config_file_name(name: &str) -> bool {
    CONFIG_FILE_NAMES.contains(&name)
}

/// Style configuration for one configuration directory.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Other configuration files merged underneath this one, relative to
    /// the declaring file. Always empty after loading.
    #[serde(default)]
    pub extends: Vec<String>,

    /// Built-in presets to enable.
    #[serde(default)]
    pub presets: Vec<String>,

    /// Tokens that are never generated even if a rule matches.
    #[serde(default)]
    pub blocklist: Vec<String>,

    /// Static rules: utility name to CSS declarations.
    #[serde(default)]
    pub rules: BTreeMap<String, String>,

    /// Pattern-based rules.
    #[serde(default)]
    pub dynamic_rules: Vec<DynamicRuleConfig>,

    /// Shortcuts: name to a space separated list of utilities.
    #[serde(default)]
    pub shortcuts: BTreeMap<String, String>,

    /// Responsive variants: name to minimum width.
    #[serde(default)]
    pub breakpoints: BTreeMap<String, String>,

    /// Text rewrite hooks applied before token recognition.
    #[serde(default)]
    pub transformers: Vec<TransformerConfig>,
}

/// A rule matching utilities by regular expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicRuleConfig {
    /// Regex matched against the whole utility name.
    pub pattern: String,
    /// CSS declarations; `$1`..`$9` expand to capture groups.
    pub css: String,
    /// Example utilities offered by autocomplete.
    #[serde(default)]
    pub autocomplete: Vec<String>,
}

/// A find/replace hook run over document text before matching.
///
/// Both `find` and `replace` are optional in the file format so that a
/// half-written hook doesn't make the whole configuration unloadable; the
/// matcher skips hooks that are missing either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// Name used in diagnostics.
    pub name: String,
    /// Regex to search for.
    #[serde(default)]
    pub find: Option<String>,
    /// Replacement text (`$1` style captures allowed).
    #[serde(default)]
    pub replace: Option<String>,
}

/// Result of loading a configuration directory.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Merged configuration.
    pub config: UserConfig,
    /// Every file that contributed, primary file first.
    pub sources: Vec<PathBuf>,
}

impl UserConfig {
    /// Parse a single configuration file's contents (no `extends` handling).
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: UserConfig =
            toml::from_str(s).map_err(|e| ConfigError::parse(Path::new("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// The configuration used when a directory has no configuration file.
    pub fn fallback() -> Self {
        Self {
            presets: vec!["core".to_string()],
            ..Self::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, preset) in self.presets.iter().enumerate() {
            if !KNOWN_PRESETS.contains(&preset.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "presets[{i}] must be one of {KNOWN_PRESETS:?}, got {preset:?}"
                )));
            }
        }

        for name in self.rules.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "rules must not contain an empty utility name".to_string(),
                ));
            }
        }

        for (i, rule) in self.dynamic_rules.iter().enumerate() {
            if let Err(e) = regex::Regex::new(&rule.pattern) {
                return Err(ConfigError::Validation(format!(
                    "dynamic_rules[{i}].pattern is not a valid regex: {e}"
                )));
            }
            if rule.css.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "dynamic_rules[{i}].css must not be empty"
                )));
            }
        }

        for (name, body) in &self.shortcuts {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "shortcuts must not contain an empty name".to_string(),
                ));
            }
            if body.split_whitespace().next().is_none() {
                return Err(ConfigError::Validation(format!(
                    "shortcuts.{name} must expand to at least one utility"
                )));
            }
        }

        for (name, width) in &self.breakpoints {
            if width.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "breakpoints.{name} must not be empty"
                )));
            }
        }

        Ok(())
    }

    /// Overlay `other` on top of `self`. Maps are overridden key by key,
    /// lists are appended.
    pub fn merge(&mut self, other: UserConfig) {
        for preset in other.presets {
            if !self.presets.contains(&preset) {
                self.presets.push(preset);
            }
        }
        for token in other.blocklist {
            if !self.blocklist.contains(&token) {
                self.blocklist.push(token);
            }
        }
        self.rules.extend(other.rules);
        self.dynamic_rules.extend(other.dynamic_rules);
        self.shortcuts.extend(other.shortcuts);
        self.breakpoints.extend(other.breakpoints);
        self.transformers.extend(other.transformers);
    }

    /// Locate and load the configuration for `dir`.
    ///
    /// Returns `Ok(None)` when `dir` contains none of [`CONFIG_FILE_NAMES`].
    pub async fn load_from_dir(dir: &Path) -> Result<Option<LoadedConfig>, ConfigError> {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Self::load_file(&candidate).await.map(Some);
            }
        }
        Ok(None)
    }

    /// Load a configuration file, resolving `extends` recursively.
    ///
    /// A file may be reached through more than one parent; only a file that
    /// extends one of its own ancestors is an error.
    pub async fn load_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
        let mut sources = Vec::new();
        let mut ancestors = HashSet::new();
        let config = load_chain(path.to_path_buf(), &mut ancestors, &mut sources).await?;
        Ok(LoadedConfig { config, sources })
    }
}

/// `ancestors` holds the canonical paths of the files currently being loaded.
async fn load_chain(
    path: PathBuf,
    ancestors: &mut HashSet<PathBuf>,
    sources: &mut Vec<PathBuf>,
) -> Result<UserConfig, ConfigError> {
    let key = tokio::fs::canonicalize(&path)
        .await
        .unwrap_or_else(|_| path.clone());
    if !ancestors.insert(key.clone()) {
        return Err(ConfigError::Validation(format!(
            "extends cycle detected at {}",
            path.display()
        )));
    }

    let content = tokio::fs::read_to_string(&path).await?;
    let mut own: UserConfig = toml::from_str(&content).map_err(|e| ConfigError::parse(&path, e))?;
    own.validate()?;
    if !sources.contains(&path) {
        sources.push(path.clone());
    }
    debug!(path = %path.display(), extends = own.extends.len(), "Loaded config file");

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut merged = UserConfig::default();
    for parent in std::mem::take(&mut own.extends) {
        let parent_path = base_dir.join(&parent);
        let parent_config = Box::pin(load_chain(parent_path, ancestors, sources)).await?;
        merged.merge(parent_config);
    }
    merged.merge(own);
    ancestors.remove(&key);
    Ok(merged)
}
