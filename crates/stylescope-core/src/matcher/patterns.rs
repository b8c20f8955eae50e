//! Inclusion and exclusion pattern sets.
//!
//! An inclusion pattern selects a region of text eligible to contain
//! tokens: capture group 1 when the pattern has one and it participated,
//! otherwise the whole match. Exclusion patterns always remove their whole
//! match.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Selects the pattern set used for token extraction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Quoted strings, tag attribute blocks and `@apply` directives.
    #[default]
    Default,
    /// `class` attributes, `@apply` directives and include annotations only.
    Strict,
}

impl Strictness {
    pub fn from_strict(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Default }
    }

    /// The pattern set for this mode.
    pub fn patterns(self) -> &'static PatternSet {
        match self {
            Self::Default => &DEFAULT_SET,
            Self::Strict => &STRICT_SET,
        }
    }
}

/// Regions to scan and regions to suppress.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub include: Vec<Regex>,
    pub exclude: Vec<Regex>,
}

impl PatternSet {
    /// Compile a pattern set from source strings.
    pub fn new(include: &[&str], exclude: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self {
            include: include.iter().map(|p| Regex::new(p)).collect::<Result<_, _>>()?,
            exclude: exclude.iter().map(|p| Regex::new(p)).collect::<Result<_, _>>()?,
        })
    }
}

const SKIP_REGION: &str = r"(?s)@stylescope-skip-start.*?@stylescope-skip-end";

const APPLY_DIRECTIVE: &str = r"@apply\s+([^;}]+)";

static DEFAULT_SET: LazyLock<PatternSet> = LazyLock::new(|| {
    PatternSet::new(
        &[
            r#""([^"]*)""#,
            r"'([^']*)'",
            r"`([^`]*)`",
            r"<[A-Za-z][\w:.-]*(\s[^<>]*)>",
            APPLY_DIRECTIVE,
        ],
        &[SKIP_REGION],
    )
    .expect("default pattern set is valid")
});

static STRICT_SET: LazyLock<PatternSet> = LazyLock::new(|| {
    PatternSet::new(
        &[
            r#":?\bclass(?:Name)?\s*=\s*["'`{]+([^"'`}]*)["'`}]"#,
            APPLY_DIRECTIVE,
            r"(?s)@stylescope-include-start(.*?)@stylescope-include-end",
        ],
        &[SKIP_REGION],
    )
    .expect("strict pattern set is valid")
});
