//! Temp-directory workspaces.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stylescope_config::Settings;
use stylescope_core::{ConfigLoader, ContextManager, MatchCache, RuleEngine, Workspace};
use tempfile::TempDir;

/// A workspace tree in a temporary directory, deleted on drop.
///
/// Paths handed out are absolute.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub async fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// A workspace with a `core`-preset configuration at its root.
    pub async fn with_root_config() -> Self {
        let ws = Self::new().await;
        ws.write_config("", "presets = [\"core\"]\n").await;
        ws
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        if relative.is_empty() {
            self.root().to_path_buf()
        } else {
            self.root().join(relative)
        }
    }

    pub async fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        tokio::fs::create_dir_all(&path)
            .await
            .expect("failed to create directory");
        path
    }

    /// Write `content` to `relative`, creating parent directories.
    pub async fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .expect("failed to create parent directory");
        }
        tokio::fs::write(&path, content)
            .await
            .expect("failed to write file");
        path
    }

    /// Write `stylescope.toml` into directory `relative_dir`.
    pub async fn write_config(&self, relative_dir: &str, toml: &str) -> PathBuf {
        let file = if relative_dir.is_empty() {
            "stylescope.toml".to_string()
        } else {
            format!("{relative_dir}/stylescope.toml")
        };
        self.write_file(&file, toml).await
    }

    /// A manager over this tree using `loader` and the built-in engines.
    pub fn manager(&self, loader: Arc<dyn ConfigLoader>) -> ContextManager {
        ContextManager::new(self.root(), loader, Arc::new(RuleEngine))
    }

    /// A facade over this tree with the file-system loader.
    pub fn workspace(&self, settings: &Settings) -> Workspace {
        Workspace::from_settings(self.root(), settings).expect("invalid test settings")
    }

    /// A facade using `loader` and `cache`.
    pub fn workspace_with(&self, loader: Arc<dyn ConfigLoader>, cache: MatchCache) -> Workspace {
        Workspace::new(self.manager(loader), cache)
    }
}
