//! Candidate-list autocomplete.

use std::collections::HashSet;
use std::sync::Arc;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use stylescope_config::MatchType;

use super::{Autocomplete, AutocompleteOptions, Generator};

/// Errors from suggestion lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutocompleteError {
    #[error("unknown variant: {0}")]
    UnknownVariant(String),
}

/// Suggests utilities and variants enumerated from a [`Generator`].
///
/// The candidate list is captured at construction; the context manager
/// rebuilds the engine when the generator or the match type changes.
pub struct PrefixAutocomplete {
    options: AutocompleteOptions,
    candidates: Vec<String>,
    variants: HashSet<String>,
}

impl PrefixAutocomplete {
    pub fn new(generator: Arc<dyn Generator>, options: AutocompleteOptions) -> Self {
        let variants: HashSet<String> = generator.variants().into_iter().collect();
        let mut candidates = generator.utilities();
        let mut variant_names: Vec<String> = variants.iter().map(|v| format!("{v}:")).collect();
        variant_names.sort();
        candidates.extend(variant_names);
        Self {
            options,
            candidates,
            variants,
        }
    }

    fn rank(&self, partial: &str) -> Vec<&str> {
        match self.options.match_type {
            MatchType::Prefix => {
                let mut hits: Vec<&str> = self
                    .candidates
                    .iter()
                    .map(String::as_str)
                    .filter(|c| c.starts_with(partial))
                    .collect();
                hits.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
                hits
            }
            MatchType::Fuzzy => {
                let matcher = SkimMatcherV2::default();
                let mut scored: Vec<(i64, &str)> = self
                    .candidates
                    .iter()
                    .filter_map(|c| matcher.fuzzy_match(c, partial).map(|s| (s, c.as_str())))
                    .collect();
                scored.sort_by(|a, b| {
                    b.0.cmp(&a.0)
                        .then_with(|| a.1.len().cmp(&b.1.len()))
                        .then_with(|| a.1.cmp(b.1))
                });
                scored.into_iter().map(|(_, c)| c).collect()
            }
        }
    }
}

impl Autocomplete for PrefixAutocomplete {
    fn suggest(&self, query: &str) -> Result<Vec<String>, AutocompleteError> {
        let (prefix, partial) = match query.rfind(':') {
            Some(i) => query.split_at(i + 1),
            None => ("", query),
        };

        for variant in prefix.split(':').filter(|v| !v.is_empty()) {
            if !self.variants.contains(variant) {
                if self.options.throw_errors {
                    return Err(AutocompleteError::UnknownVariant(variant.to_string()));
                }
                return Ok(Vec::new());
            }
        }

        Ok(self
            .rank(partial)
            .into_iter()
            .take(self.options.max_items)
            .map(|c| format!("{prefix}{c}"))
            .collect())
    }

    fn options(&self) -> AutocompleteOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RuleGenerator;
    use pretty_assertions::assert_eq;
    use stylescope_config::UserConfig;

    fn engine(match_type: MatchType, throw_errors: bool) -> PrefixAutocomplete {
        let generator = Arc::new(RuleGenerator::new(&UserConfig::fallback()));
        PrefixAutocomplete::new(
            generator,
            AutocompleteOptions {
                match_type,
                throw_errors,
                max_items: 5,
            },
        )
    }

    #[test]
    fn test_prefix_ranks_shorter_first() {
        let ac = engine(MatchType::Prefix, false);
        let hits = ac.suggest("fle").unwrap();
        assert_eq!(hits[0], "flex");
        assert!(hits.iter().all(|h| h.starts_with("fle")));
    }

    #[test]
    fn test_prefix_respects_max_items() {
        let ac = engine(MatchType::Prefix, false);
        assert_eq!(ac.suggest("").unwrap().len(), 5);
    }

    #[test]
    fn test_variant_prefix_is_preserved() {
        let ac = engine(MatchType::Prefix, false);
        let hits = ac.suggest("hover:bg-bl").unwrap();
        assert_eq!(hits, vec!["hover:bg-blue".to_string(), "hover:bg-black".to_string()]);
    }

    #[test]
    fn test_variants_are_suggested() {
        let ac = engine(MatchType::Prefix, false);
        assert!(ac.suggest("hov").unwrap().contains(&"hover:".to_string()));
    }

    #[test]
    fn test_unknown_variant_without_throw() {
        let ac = engine(MatchType::Prefix, false);
        assert!(ac.suggest("wobble:fl").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_variant_with_throw() {
        let ac = engine(MatchType::Prefix, true);
        assert_eq!(
            ac.suggest("wobble:fl").unwrap_err(),
            AutocompleteError::UnknownVariant("wobble".to_string())
        );
    }

    #[test]
    fn test_fuzzy_matches_subsequence() {
        let ac = engine(MatchType::Fuzzy, false);
        let hits = ac.suggest("jcen").unwrap();
        assert_eq!(hits[0], "justify-center");
    }

    #[test]
    fn test_fuzzy_ranking() {
        let ac = engine(MatchType::Fuzzy, false);
        let hits = ac.suggest("fl").unwrap();
        assert_eq!(hits[0], "flex");
        assert!(ac.suggest("zqxj").unwrap().is_empty());
    }

    #[test]
    fn test_fuzzy_keeps_variant_prefix() {
        let ac = engine(MatchType::Fuzzy, false);
        let hits = ac.suggest("hover:jcen").unwrap();
        assert_eq!(hits[0], "hover:justify-center");
    }
}
