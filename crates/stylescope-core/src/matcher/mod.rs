//! Token matcher: finds utility tokens and their byte offsets in a document.
//!
//! Scanning happens in four steps:
//!
//! 1. exclusion regions are found and blanked out (same byte length), so no
//!    inclusion pattern can see or straddle them;
//! 2. inclusion patterns select eligible regions of the blanked text;
//! 3. each region is split into candidate tokens on whitespace, quotes and
//!    markup punctuation;
//! 4. candidates are kept only if the active configuration recognizes them.
//!
//! Transform hooks affect step 4. If any hook rewrites the document, every
//! candidate is passed through the hooks that ran cleanly and is kept when
//! its rewritten form is recognized; if all hooks decline, candidates are
//! checked as written. Offsets and `token` always refer to the original
//! text, `utility` is the form the generator recognized.

pub mod patterns;
pub mod transform;

use std::borrow::Cow;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::engine::Generator;

pub use patterns::{PatternSet, Strictness};
pub use transform::{RegexTransform, TransformError, TransformHook};

/// One recognized token in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchedPosition {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// The token text, `text[start..end]`.
    pub token: String,
    /// What the generator recognized: `token` after transform hooks.
    pub utility: String,
}

/// Scans document text against a context's configuration.
pub trait TokenScan: Send + Sync {
    fn scan(&self, context: &Context, text: &str, strictness: Strictness) -> Vec<MatchedPosition>;
}

/// The built-in scanner.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenMatcher;

impl TokenScan for TokenMatcher {
    fn scan(&self, context: &Context, text: &str, strictness: Strictness) -> Vec<MatchedPosition> {
        let generator = context.generator();
        match_positions(
            text,
            strictness.patterns(),
            generator.as_ref(),
            context.transformers(),
        )
    }
}

/// Find recognized tokens in `text`.
pub fn match_positions(
    text: &str,
    patterns: &PatternSet,
    generator: &dyn Generator,
    hooks: &[Arc<dyn TransformHook>],
) -> Vec<MatchedPosition> {
    let excluded = merge_ranges(
        patterns
            .exclude
            .iter()
            .flat_map(|re| re.find_iter(text).map(|m| m.range()))
            .collect(),
    );
    let masked = mask(text, &excluded);

    let included = merge_ranges(
        patterns
            .include
            .iter()
            .flat_map(|re| re.captures_iter(&masked))
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)).map(|m| m.range()))
            .collect(),
    );

    let active = active_hooks(text, hooks);

    let mut positions = Vec::new();
    for region in included {
        for (start, token) in split_tokens(&masked, region) {
            let utility = match &active {
                Some(active) => rewrite(token, active),
                None => Cow::Borrowed(token),
            };
            if !utility.is_empty() && generator.is_valid(&utility) {
                positions.push(MatchedPosition {
                    start,
                    end: start + token.len(),
                    token: token.to_string(),
                    utility: utility.into_owned(),
                });
            }
        }
    }
    positions
}

/// Run the hooks over the whole document in order and keep the well-formed
/// ones. `None` if none of them rewrote anything.
fn active_hooks<'h>(
    text: &str,
    hooks: &'h [Arc<dyn TransformHook>],
) -> Option<Vec<&'h dyn TransformHook>> {
    let mut current: Option<String> = None;
    let mut active = Vec::with_capacity(hooks.len());
    for hook in hooks {
        let input = current.as_deref().unwrap_or(text);
        match hook.transform(input) {
            Ok(Some(rewritten)) => {
                current = Some(rewritten);
                active.push(hook.as_ref());
            }
            Ok(None) => active.push(hook.as_ref()),
            Err(e) => debug!(hook = hook.name(), error = %e, "Skipping transformer"),
        }
    }
    current.map(|_| active)
}

fn rewrite<'t>(token: &'t str, hooks: &[&dyn TransformHook]) -> Cow<'t, str> {
    let mut current = Cow::Borrowed(token);
    for hook in hooks {
        if let Ok(Some(rewritten)) = hook.transform(&current) {
            current = Cow::Owned(rewritten);
        }
    }
    current
}

/// Sort and coalesce overlapping or touching ranges.
fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.sort_by_key(|r| r.start);
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Replace every byte in `ranges` with a space. Ranges come from regex
/// matches, so they sit on char boundaries and the result stays UTF-8.
fn mask(text: &str, ranges: &[Range<usize>]) -> String {
    if ranges.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for range in ranges {
        out.push_str(&text[cursor..range.start]);
        out.extend(std::iter::repeat_n(' ', range.end - range.start));
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | '`' | ';' | '{' | '}' | '<' | '>' | '=')
}

/// Tokens inside `region` with their absolute byte offsets.
fn split_tokens(text: &str, region: Range<usize>) -> impl Iterator<Item = (usize, &str)> {
    let base = region.start;
    let slice = &text[region];
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in slice.char_indices() {
        match (is_separator(c), start) {
            (true, Some(s)) => {
                tokens.push((base + s, &slice[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((base + s, &slice[s..]));
    }
    tokens.into_iter()
}
