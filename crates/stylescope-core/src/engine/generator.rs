//! Rule-table style generator.
//!
//! A token is `variant:variant:utility`. The utility resolves through static
//! rules, then dynamic (regex) rules, then shortcuts; variants wrap the
//! resulting rule in a pseudo-class, a `.dark` ancestor, or a min-width media
//! query. Generated rules are memoized per token for the lifetime of the
//! generator; tokens that generate nothing are not remembered.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use regex::Regex;
use stylescope_config::UserConfig;
use tracing::warn;

use super::preset;
use super::{GenerateResult, Generator};
use crate::lock;

const PSEUDO_VARIANTS: &[(&str, &str)] = &[
    ("hover", ":hover"),
    ("focus", ":focus"),
    ("active", ":active"),
    ("disabled", ":disabled"),
    ("first", ":first-child"),
    ("last", ":last-child"),
];

const DARK_VARIANT: &str = "dark";

/// Shortcuts may reference other shortcuts; stop expanding past this depth.
const MAX_SHORTCUT_DEPTH: usize = 8;

struct DynamicRule {
    pattern: Regex,
    css: String,
    examples: Vec<String>,
}

/// Generator backed by the rule tables of a [`UserConfig`].
pub struct RuleGenerator {
    statics: BTreeMap<String, String>,
    dynamics: Vec<DynamicRule>,
    shortcuts: BTreeMap<String, Vec<String>>,
    blocklist: HashSet<String>,
    breakpoints: BTreeMap<String, String>,
    cache: Mutex<HashMap<String, Arc<str>>>,
}

impl RuleGenerator {
    /// Build a generator from `config`, layering it over its presets.
    pub fn new(config: &UserConfig) -> Self {
        let mut effective = UserConfig::default();
        for name in &config.presets {
            match preset::preset(name) {
                Some(p) => effective.merge(p),
                None => warn!(preset = %name, "Unknown preset ignored"),
            }
        }
        let mut own = config.clone();
        own.presets.clear();
        effective.merge(own);

        let dynamics = effective
            .dynamic_rules
            .iter()
            .filter_map(|rule| match Regex::new(&rule.pattern) {
                Ok(pattern) => Some(DynamicRule {
                    pattern,
                    css: rule.css.clone(),
                    examples: rule.autocomplete.clone(),
                }),
                Err(e) => {
                    warn!(pattern = %rule.pattern, error = %e, "Skipping dynamic rule");
                    None
                }
            })
            .collect();

        let shortcuts = effective
            .shortcuts
            .iter()
            .map(|(name, body)| {
                let parts = body.split_whitespace().map(str::to_string).collect();
                (name.clone(), parts)
            })
            .collect();

        Self {
            statics: effective.rules,
            dynamics,
            shortcuts,
            blocklist: effective.blocklist.into_iter().collect(),
            breakpoints: effective.breakpoints,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// CSS for one token. Only hits are memoized.
    fn rule_for(&self, token: &str) -> Option<Arc<str>> {
        if let Some(hit) = lock(&self.cache).get(token) {
            return Some(Arc::clone(hit));
        }

        let built: Arc<str> = Arc::from(self.build(token)?);
        lock(&self.cache).insert(token.to_string(), Arc::clone(&built));
        Some(built)
    }

    fn build(&self, token: &str) -> Option<String> {
        if self.blocklist.contains(token) {
            return None;
        }
        let (variants, utility) = split_variants(token);
        if utility.is_empty() || self.blocklist.contains(utility) {
            return None;
        }

        let declarations = self.declarations(utility, 0)?;

        let mut selector = format!(".{}", escape_selector(token));
        let mut media = Vec::new();
        for variant in variants {
            if let Some((_, pseudo)) = PSEUDO_VARIANTS.iter().find(|(name, _)| *name == variant) {
                selector.push_str(pseudo);
            } else if variant == DARK_VARIANT {
                selector = format!(".dark {selector}");
            } else if let Some(width) = self.breakpoints.get(variant) {
                media.push(format!("(min-width: {width})"));
            } else {
                return None;
            }
        }

        let body = format!("{selector} {{ {} }}", declarations.join(" "));
        if media.is_empty() {
            Some(body)
        } else {
            Some(format!("@media {} {{ {body} }}", media.join(" and ")))
        }
    }

    /// Normalized `prop: value;` declarations for a bare utility.
    fn declarations(&self, utility: &str, depth: usize) -> Option<Vec<String>> {
        if let Some(css) = self.statics.get(utility) {
            return Some(normalize_declarations(css));
        }

        // Later rules (the directory's own) take precedence over presets.
        for rule in self.dynamics.iter().rev() {
            if let Some(caps) = rule.pattern.captures(utility) {
                return Some(normalize_declarations(&expand_template(&rule.css, &caps)));
            }
        }

        if depth < MAX_SHORTCUT_DEPTH
            && let Some(parts) = self.shortcuts.get(utility)
        {
            let declarations: Vec<String> = parts
                .iter()
                .filter(|part| !self.blocklist.contains(part.as_str()))
                .filter_map(|part| self.declarations(part, depth + 1))
                .flatten()
                .collect();
            if !declarations.is_empty() {
                return Some(declarations);
            }
        }

        None
    }
}

impl Generator for RuleGenerator {
    fn is_valid(&self, token: &str) -> bool {
        self.rule_for(token).is_some()
    }

    fn generate(&self, tokens: &[&str]) -> GenerateResult {
        let mut result = GenerateResult::default();
        let mut rules = Vec::new();
        for token in tokens {
            if result.matched.contains(*token) {
                continue;
            }
            if let Some(rule) = self.rule_for(token) {
                result.matched.insert(token.to_string());
                rules.push(rule);
            }
        }
        result.css = rules.iter().map(|r| r.as_ref()).collect::<Vec<_>>().join("\n");
        result
    }

    fn utilities(&self) -> Vec<String> {
        let mut all: BTreeSet<String> = self.statics.keys().cloned().collect();
        all.extend(self.shortcuts.keys().cloned());
        for rule in &self.dynamics {
            all.extend(rule.examples.iter().cloned());
        }
        all.retain(|u| !self.blocklist.contains(u));
        all.into_iter().collect()
    }

    fn variants(&self) -> Vec<String> {
        let mut all: Vec<String> = PSEUDO_VARIANTS
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        all.push(DARK_VARIANT.to_string());
        all.extend(self.breakpoints.keys().cloned());
        all
    }
}

/// Split `a:b:util` into (`["a", "b"]`, `"util"`), ignoring `:` inside
/// square brackets.
pub(crate) fn split_variants(token: &str) -> (Vec<&str>, &str) {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in token.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                parts.push(&token[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    (parts, &token[start..])
}

fn normalize_declarations(css: &str) -> Vec<String> {
    css.split(';')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| format!("{d};"))
        .collect()
}

/// Expand `$1`..`$9` in `template` from `caps`.
fn expand_template(template: &str, caps: &regex::Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$'
            && let Some(digit) = chars.peek().and_then(|d| d.to_digit(10))
        {
            chars.next();
            if let Some(m) = caps.get(digit as usize) {
                out.push_str(m.as_str());
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn escape_selector(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}
