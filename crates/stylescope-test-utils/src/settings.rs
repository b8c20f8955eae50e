//! Settings builder for tests.

use stylescope_config::{MatchType, Settings};

/// Fluent builder for [`Settings`].
///
/// ```ignore
/// let settings = TestSettingsBuilder::new()
///     .strict(true)
///     .match_type(MatchType::Fuzzy)
///     .build();
/// ```
pub struct TestSettingsBuilder {
    settings: Settings,
}

impl TestSettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
        }
    }

    pub fn root(mut self, root: &str) -> Self {
        self.settings.workspace.root = Some(root.to_string());
        self
    }

    /// Replace the exclusion globs.
    pub fn exclude(mut self, globs: &[&str]) -> Self {
        self.settings.workspace.exclude = globs.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.settings.matching.strict = strict;
        self
    }

    pub fn match_type(mut self, match_type: MatchType) -> Self {
        self.settings.autocomplete.match_type = match_type;
        self
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.settings.autocomplete.max_items = max_items;
        self
    }

    pub fn throw_errors(mut self, throw: bool) -> Self {
        self.settings.autocomplete.throw_errors = throw;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.settings.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}

impl Default for TestSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
