//! Text rewrite hooks run before token recognition.

use regex::Regex;
use stylescope_config::TransformerConfig;

/// Errors from a malformed hook. The matcher logs and skips these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("transformer {name:?} has no rewrite operation")]
    MissingRewrite { name: String },

    #[error("transformer {name:?} has an invalid pattern: {reason}")]
    InvalidPattern { name: String, reason: String },
}

/// A hook that may rewrite document text.
pub trait TransformHook: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Rewrite `text`. `Ok(None)` means the hook declined (no change).
    fn transform(&self, text: &str) -> Result<Option<String>, TransformError>;
}

/// Find/replace hook built from a [`TransformerConfig`].
#[derive(Debug)]
pub struct RegexTransform {
    name: String,
    find: Option<Result<Regex, String>>,
    replace: Option<String>,
}

impl RegexTransform {
    pub fn from_config(config: &TransformerConfig) -> Self {
        Self {
            name: config.name.clone(),
            find: config
                .find
                .as_deref()
                .map(|p| Regex::new(p).map_err(|e| e.to_string())),
            replace: config.replace.clone(),
        }
    }
}

impl TransformHook for RegexTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, text: &str) -> Result<Option<String>, TransformError> {
        let (Some(find), Some(replace)) = (&self.find, &self.replace) else {
            return Err(TransformError::MissingRewrite {
                name: self.name.clone(),
            });
        };
        let find = find.as_ref().map_err(|reason| TransformError::InvalidPattern {
            name: self.name.clone(),
            reason: reason.clone(),
        })?;

        let rewritten = find.replace_all(text, replace.as_str());
        if rewritten == text {
            Ok(None)
        } else {
            Ok(Some(rewritten.into_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(find: Option<&str>, replace: Option<&str>) -> RegexTransform {
        RegexTransform::from_config(&TransformerConfig {
            name: "t".to_string(),
            find: find.map(str::to_string),
            replace: replace.map(str::to_string),
        })
    }

    #[test]
    fn test_rewrites_matching_text() {
        let t = hook(Some("tw-"), Some(""));
        assert_eq!(t.transform("tw-flex").unwrap().as_deref(), Some("flex"));
    }

    #[test]
    fn test_declines_when_nothing_matches() {
        let t = hook(Some("zzz"), Some("y"));
        assert_eq!(t.transform("flex").unwrap(), None);
    }

    #[test]
    fn test_missing_replace_is_malformed() {
        let t = hook(Some("x"), None);
        assert!(matches!(
            t.transform("x"),
            Err(TransformError::MissingRewrite { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern_is_malformed() {
        let t = hook(Some("("), Some(""));
        assert!(matches!(
            t.transform("x"),
            Err(TransformError::InvalidPattern { .. })
        ));
    }
}
