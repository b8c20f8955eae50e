//! Configuration loader seam.

use std::path::Path;

use stylescope_config::{ConfigError, LoadedConfig, UserConfig};

use crate::BoxFuture;

/// Locates and parses the configuration for a directory.
///
/// Implementations must be safe to call repeatedly and must not touch
/// process state beyond reading files.
pub trait ConfigLoader: Send + Sync {
    /// `Ok(None)` when `dir` has no configuration of its own.
    fn load<'a>(&'a self, dir: &'a Path)
    -> BoxFuture<'a, Result<Option<LoadedConfig>, ConfigError>>;
}

/// Loads `stylescope.toml` style files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsConfigLoader;

impl ConfigLoader for FsConfigLoader {
    fn load<'a>(
        &'a self,
        dir: &'a Path,
    ) -> BoxFuture<'a, Result<Option<LoadedConfig>, ConfigError>> {
        Box::pin(UserConfig::load_from_dir(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fs_loader_finds_config() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("stylescope.toml"), "presets = [\"core\"]\n")
            .await
            .unwrap();
        let loaded = FsConfigLoader.load(tmp.path()).await.unwrap().unwrap();
        assert_eq!(loaded.config.presets, vec!["core".to_string()]);
        assert_eq!(loaded.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_fs_loader_empty_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(FsConfigLoader.load(tmp.path()).await.unwrap().is_none());
    }
}
