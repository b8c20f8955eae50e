//! Per-document memo of token positions.
//!
//! Entries are keyed by `(strictness, document id)` and never compare
//! content: the owner of the document must evict on every change. Each key
//! has its own lock, held for the whole evict/lookup/scan/store sequence.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::context::Context;
use crate::lock;
use crate::matcher::{MatchedPosition, Strictness, TokenMatcher, TokenScan};

/// Cache key: matching mode plus document identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub strictness: Strictness,
    pub doc_id: String,
}

impl MatchKey {
    pub fn new(strictness: Strictness, doc_id: impl Into<String>) -> Self {
        Self {
            strictness,
            doc_id: doc_id.into(),
        }
    }
}

type Slot = Arc<Mutex<Option<Arc<[MatchedPosition]>>>>;

/// Memoizes [`TokenScan`] output per document.
pub struct MatchCache {
    scanner: Arc<dyn TokenScan>,
    slots: Mutex<HashMap<MatchKey, Slot>>,
}

impl MatchCache {
    /// A cache backed by the built-in [`TokenMatcher`].
    pub fn new() -> Self {
        Self::with_scanner(Arc::new(TokenMatcher))
    }

    pub fn with_scanner(scanner: Arc<dyn TokenScan>) -> Self {
        Self {
            scanner,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Token positions for `content` under `context`.
    ///
    /// A cached entry for `(strict, doc_id)` is returned as is unless
    /// `force` is set, in which case it is dropped and recomputed.
    pub fn get_matched_positions_from_doc(
        &self,
        context: &Context,
        content: &str,
        doc_id: &str,
        strict: bool,
        force: bool,
    ) -> Arc<[MatchedPosition]> {
        self.get_matched_positions_if_current(context, content, doc_id, strict, force, |_| true)
    }

    /// Like [`get_matched_positions_from_doc`], but a freshly scanned result
    /// is stored only if `is_current(context)` still holds once the scan is
    /// done. Stale results are returned to the caller and not cached.
    ///
    /// [`get_matched_positions_from_doc`]: Self::get_matched_positions_from_doc
    pub fn get_matched_positions_if_current(
        &self,
        context: &Context,
        content: &str,
        doc_id: &str,
        strict: bool,
        force: bool,
        is_current: impl FnOnce(&Context) -> bool,
    ) -> Arc<[MatchedPosition]> {
        let key = MatchKey::new(Strictness::from_strict(strict), doc_id);
        let slot = Arc::clone(lock(&self.slots).entry(key.clone()).or_default());

        let mut entry = lock(&slot);
        if force {
            *entry = None;
        }
        if let Some(hit) = entry.as_ref() {
            debug!(doc = doc_id, strict, "Match cache hit");
            return Arc::clone(hit);
        }

        let positions: Arc<[MatchedPosition]> =
            self.scanner.scan(context, content, key.strictness).into();
        debug!(
            doc = doc_id,
            strict,
            force,
            tokens = positions.len(),
            context = %context.config_dir().display(),
            "Scanned document"
        );
        if is_current(context) {
            *entry = Some(Arc::clone(&positions));
        } else {
            debug!(
                doc = doc_id,
                generation = context.generation(),
                "Context went stale during scan, result not cached"
            );
        }
        positions
    }

    /// Drop both strictness variants of `doc_id`.
    pub fn clear_document_cache(&self, doc_id: &str) {
        let mut slots = lock(&self.slots);
        for strictness in [Strictness::Default, Strictness::Strict] {
            slots.remove(&MatchKey::new(strictness, doc_id));
        }
    }

    /// Drop everything.
    pub fn clear_all_cache(&self) {
        let mut slots = lock(&self.slots);
        debug!(entries = slots.len(), "Clearing match cache");
        slots.clear();
    }

    /// Number of keys with a slot (cached or being computed).
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MatchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AutocompleteOptions, RuleEngine};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl TokenScan for Counting {
        fn scan(&self, context: &Context, text: &str, strictness: Strictness) -> Vec<MatchedPosition> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            TokenMatcher.scan(context, text, strictness)
        }
    }

    fn context() -> Context {
        Context::build(
            PathBuf::from("/ws"),
            1,
            None,
            &RuleEngine,
            AutocompleteOptions::default(),
        )
    }

    fn tokens(positions: &[MatchedPosition]) -> Vec<&str> {
        positions.iter().map(|p| p.token.as_str()).collect()
    }

    #[test]
    fn test_repeated_reads_scan_once() {
        let scanner = Arc::new(Counting::default());
        let cache = MatchCache::with_scanner(scanner.clone());
        let ctx = context();

        let first = cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "a", false, false);
        let second = cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "a", false, false);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_does_not_compare_content() {
        let cache = MatchCache::new();
        let ctx = context();
        cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "a", false, false);
        let stale = cache.get_matched_positions_from_doc(&ctx, r#""block""#, "a", false, false);
        assert_eq!(tokens(&stale), vec!["flex"]);
    }

    #[test]
    fn test_clear_document_reflects_new_content() {
        let cache = MatchCache::new();
        let ctx = context();
        cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "a", false, false);
        cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "a", true, false);
        cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "b", false, false);

        cache.clear_document_cache("a");
        assert_eq!(cache.len(), 1);

        let fresh = cache.get_matched_positions_from_doc(&ctx, r#""block""#, "a", false, false);
        assert_eq!(tokens(&fresh), vec!["block"]);
    }

    #[test]
    fn test_force_recomputes() {
        let scanner = Arc::new(Counting::default());
        let cache = MatchCache::with_scanner(scanner.clone());
        let ctx = context();

        cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "a", false, false);
        let forced = cache.get_matched_positions_from_doc(&ctx, r#""block""#, "a", false, true);
        assert_eq!(tokens(&forced), vec!["block"]);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 2);

        let after = cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "a", false, false);
        assert_eq!(tokens(&after), vec!["block"]);
    }

    #[test]
    fn test_strictness_is_part_of_key() {
        let scanner = Arc::new(Counting::default());
        let cache = MatchCache::with_scanner(scanner.clone());
        let ctx = context();
        let text = r#"const a = "flex"; <div class="block">"#;

        let loose = cache.get_matched_positions_from_doc(&ctx, text, "a", false, false);
        let strict = cache.get_matched_positions_from_doc(&ctx, text, "a", true, false);
        assert_eq!(tokens(&loose), vec!["flex", "block"]);
        assert_eq!(tokens(&strict), vec!["block"]);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_scan_is_not_stored() {
        let scanner = Arc::new(Counting::default());
        let cache = MatchCache::with_scanner(scanner.clone());
        let ctx = context();

        let stale =
            cache.get_matched_positions_if_current(&ctx, r#""flex""#, "a", false, false, |_| false);
        assert_eq!(tokens(&stale), vec!["flex"]);

        let fresh = cache.get_matched_positions_from_doc(&ctx, r#""block""#, "a", false, false);
        assert_eq!(tokens(&fresh), vec!["block"]);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear_all() {
        let cache = MatchCache::new();
        let ctx = context();
        cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "a", false, false);
        cache.get_matched_positions_from_doc(&ctx, r#""flex""#, "b", false, false);
        cache.clear_all_cache();
        assert!(cache.is_empty());
    }
}
