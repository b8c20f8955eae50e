//! Style engines bound to a context.
//!
//! The context manager treats the generator and the autocomplete engine as
//! collaborators behind traits. [`RuleEngine`] wires up the built-in
//! implementations; embedders with a different engine provide their own
//! [`EngineFactory`].

pub mod autocomplete;
pub mod generator;
pub mod preset;

use std::collections::BTreeSet;
use std::sync::Arc;

use stylescope_config::{MatchType, UserConfig};

pub use autocomplete::{AutocompleteError, PrefixAutocomplete};
pub use generator::RuleGenerator;

/// Output of a generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResult {
    /// Generated stylesheet text. Empty when nothing matched.
    pub css: String,
    /// Tokens that produced output.
    pub matched: BTreeSet<String>,
}

/// A configured style generator.
pub trait Generator: Send + Sync {
    /// Whether `token` is a utility this configuration recognizes.
    fn is_valid(&self, token: &str) -> bool;

    /// Generate CSS for the given tokens. Unknown tokens contribute nothing.
    fn generate(&self, tokens: &[&str]) -> GenerateResult;

    /// Enumerable utility names (static rules, shortcuts, rule examples).
    fn utilities(&self) -> Vec<String>;

    /// Known variant prefixes, without the trailing `:`.
    fn variants(&self) -> Vec<String>;
}

/// Options an autocomplete engine is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutocompleteOptions {
    pub match_type: MatchType,
    pub throw_errors: bool,
    pub max_items: usize,
}

impl Default for AutocompleteOptions {
    fn default() -> Self {
        Self {
            match_type: MatchType::Prefix,
            throw_errors: false,
            max_items: 50,
        }
    }
}

impl From<&stylescope_config::AutocompleteSettings> for AutocompleteOptions {
    fn from(settings: &stylescope_config::AutocompleteSettings) -> Self {
        Self {
            match_type: settings.match_type,
            throw_errors: settings.throw_errors,
            max_items: settings.max_items,
        }
    }
}

/// Suggests completions for partially typed utilities.
pub trait Autocomplete: Send + Sync {
    /// Ranked candidates for `query`.
    fn suggest(&self, query: &str) -> Result<Vec<String>, AutocompleteError>;

    /// The options this engine was built with.
    fn options(&self) -> AutocompleteOptions;
}

/// Builds engines for a freshly loaded configuration.
pub trait EngineFactory: Send + Sync {
    /// Build a generator for `config`.
    fn configure(&self, config: &UserConfig) -> Arc<dyn Generator>;

    /// Build an autocomplete engine bound to `generator`.
    fn autocomplete(
        &self,
        generator: Arc<dyn Generator>,
        options: AutocompleteOptions,
    ) -> Arc<dyn Autocomplete>;
}

/// Factory for the built-in [`RuleGenerator`] and [`PrefixAutocomplete`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl EngineFactory for RuleEngine {
    fn configure(&self, config: &UserConfig) -> Arc<dyn Generator> {
        Arc::new(RuleGenerator::new(config))
    }

    fn autocomplete(
        &self,
        generator: Arc<dyn Generator>,
        options: AutocompleteOptions,
    ) -> Arc<dyn Autocomplete> {
        Arc::new(PrefixAutocomplete::new(generator, options))
    }
}
