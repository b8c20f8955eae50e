//! Editor-facing facade over one [`ContextManager`] and one [`MatchCache`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use stylescope_config::{ConfigError, Settings, is_config_file_name};
use tracing::{debug, info};

use crate::cache::MatchCache;
use crate::context::{Context, ContextError, ContextManager};
use crate::engine::{AutocompleteError, RuleEngine};
use crate::loader::FsConfigLoader;
use crate::matcher::MatchedPosition;

/// The token under a cursor and the CSS it generates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    #[serde(flatten)]
    pub position: MatchedPosition,
    pub css: String,
    pub config_dir: PathBuf,
}

pub struct Workspace {
    manager: ContextManager,
    cache: MatchCache,
    strict: AtomicBool,
}

impl Workspace {
    pub fn new(manager: ContextManager, cache: MatchCache) -> Self {
        Self {
            manager,
            cache,
            strict: AtomicBool::new(false),
        }
    }

    /// A workspace on the file-system loader and built-in engines.
    pub fn from_settings(root: impl Into<PathBuf>, settings: &Settings) -> Result<Self, ConfigError> {
        let manager = ContextManager::from_settings(
            root,
            settings,
            Arc::new(FsConfigLoader),
            Arc::new(RuleEngine),
        )?;
        let workspace = Self::new(manager, MatchCache::new());
        workspace.set_strict(settings.matching.strict);
        Ok(workspace)
    }

    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }

    pub fn cache(&self) -> &MatchCache {
        &self.cache
    }

    pub fn strict(&self) -> bool {
        self.strict.load(Ordering::Relaxed)
    }

    pub fn set_strict(&self, strict: bool) {
        self.strict.store(strict, Ordering::Relaxed);
    }

    /// Reload every context and empty the match cache.
    ///
    /// The cache is cleared even when the root load fails.
    pub async fn reload(&self) -> Result<Arc<Context>, ContextError> {
        let result = self.manager.reload().await;
        self.cache.clear_all_cache();
        result
    }

    /// Token positions for an open document, or `None` for files with no
    /// governing context.
    pub async fn matched_positions(
        &self,
        file: &Path,
        doc_id: &str,
        content: &str,
        force: bool,
    ) -> Option<Arc<[MatchedPosition]>> {
        let context = self.manager.resolve_closest_context(content, file).await?;
        Some(self.positions(&context, content, doc_id, force))
    }

    /// Positions from the cache. A context that a reload replaced while it was
    /// being resolved or scanned never writes into the cache.
    fn positions(&self, context: &Context, content: &str, doc_id: &str, force: bool) -> Arc<[MatchedPosition]> {
        self.cache.get_matched_positions_if_current(
            context,
            content,
            doc_id,
            self.strict(),
            force,
            |ctx| self.manager.is_current(ctx),
        )
    }

    pub fn document_changed(&self, doc_id: &str) {
        self.cache.clear_document_cache(doc_id);
    }

    pub fn document_closed(&self, doc_id: &str) {
        self.cache.clear_document_cache(doc_id);
    }

    /// React to a file-system change. Reloads when `path` fed a loaded
    /// context or is named like a configuration file; returns whether a
    /// reload happened.
    pub async fn config_file_changed(&self, path: &Path) -> Result<bool, ContextError> {
        let named_like_config = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_config_file_name);
        if !named_like_config && !self.manager.is_config_source(path) {
            debug!(path = %path.display(), "Change does not affect configuration");
            return Ok(false);
        }
        info!(path = %path.display(), "Configuration changed");
        self.reload().await?;
        Ok(true)
    }

    /// The recognized token covering byte `offset`, with its CSS.
    pub async fn token_at(
        &self,
        file: &Path,
        doc_id: &str,
        content: &str,
        offset: usize,
    ) -> Option<TokenInfo> {
        let context = self.manager.resolve_closest_context(content, file).await?;
        let positions = self.positions(&context, content, doc_id, false);
        let position = positions
            .iter()
            .find(|p| p.start <= offset && offset < p.end)?
            .clone();
        let css = context.generator().generate(&[position.utility.as_str()]).css;
        Some(TokenInfo {
            position,
            css,
            config_dir: context.config_dir().to_path_buf(),
        })
    }

    /// Completions for `query` from the context governing `file`.
    pub async fn suggest(
        &self,
        file: &Path,
        content: &str,
        query: &str,
    ) -> Result<Vec<String>, AutocompleteError> {
        match self.manager.resolve_closest_context(content, file).await {
            Some(context) => context.autocomplete().suggest(query),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn workspace() -> (TempDir, Workspace) {
        let tmp = TempDir::new().unwrap();
        tokio::fs::create_dir_all(tmp.path().join("app/src")).await.unwrap();
        tokio::fs::write(tmp.path().join("stylescope.toml"), "presets = [\"core\"]\n")
            .await
            .unwrap();
        tokio::fs::write(
            tmp.path().join("app/stylescope.toml"),
            "presets = [\"core\"]\n[shortcuts]\nbtn = \"px-4 rounded\"\n",
        )
        .await
        .unwrap();
        let ws = Workspace::from_settings(tmp.path(), &Settings::default()).unwrap();
        ws.reload().await.unwrap();
        (tmp, ws)
    }

    #[tokio::test]
    async fn test_matched_positions_use_nested_context() {
        let (tmp, ws) = workspace().await;
        let file = tmp.path().join("app/src/view.html");
        let positions = ws
            .matched_positions(&file, "view", r#"<a class="btn flex">"#, false)
            .await
            .unwrap();
        let tokens: Vec<&str> = positions.iter().map(|p| p.token.as_str()).collect();
        assert_eq!(tokens, vec!["btn", "flex"]);
    }

    #[tokio::test]
    async fn test_excluded_file_has_no_positions() {
        let (tmp, ws) = workspace().await;
        let file = tmp.path().join("node_modules/pkg/index.js");
        assert!(ws.matched_positions(&file, "dep", "\"flex\"", false).await.is_none());
    }

    #[tokio::test]
    async fn test_document_changed_evicts() {
        let (tmp, ws) = workspace().await;
        let file = tmp.path().join("index.html");
        ws.matched_positions(&file, "doc", "\"flex\"", false).await.unwrap();
        ws.document_changed("doc");
        let positions = ws.matched_positions(&file, "doc", "\"block\"", false).await.unwrap();
        assert_eq!(positions[0].token, "block");
    }

    #[tokio::test]
    async fn test_reload_clears_match_cache() {
        let (tmp, ws) = workspace().await;
        ws.matched_positions(&tmp.path().join("index.html"), "doc", "\"flex\"", false)
            .await
            .unwrap();
        assert!(!ws.cache().is_empty());
        ws.reload().await.unwrap();
        assert!(ws.cache().is_empty());
    }

    #[tokio::test]
    async fn test_config_file_changed() {
        let (tmp, ws) = workspace().await;
        let before = ws.manager().generation();

        assert!(!ws.config_file_changed(&tmp.path().join("app/src/view.html")).await.unwrap());
        assert_eq!(ws.manager().generation(), before);

        assert!(ws.config_file_changed(&tmp.path().join("stylescope.toml")).await.unwrap());
        assert_eq!(ws.manager().generation(), before + 1);
    }

    #[tokio::test]
    async fn test_token_at_returns_css() {
        let (tmp, ws) = workspace().await;
        let file = tmp.path().join("app/src/view.html");
        let content = r#"<a class="btn flex">"#;

        let info = ws.token_at(&file, "view", content, 11).await.unwrap();
        assert_eq!(info.position.token, "btn");
        assert!(info.css.contains("rounded") || info.css.contains("padding"));
        assert_eq!(info.config_dir, tmp.path().join("app"));

        assert!(ws.token_at(&file, "view", content, 0).await.is_none());
    }

    #[tokio::test]
    async fn test_suggest_uses_governing_context() {
        let (tmp, ws) = workspace().await;
        let nested = ws
            .suggest(&tmp.path().join("app/src/view.html"), "", "bt")
            .await
            .unwrap();
        assert!(nested.contains(&"btn".to_string()));

        let root = ws.suggest(&tmp.path().join("index.html"), "", "bt").await.unwrap();
        assert!(!root.contains(&"btn".to_string()));
    }
}
