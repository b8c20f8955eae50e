//! Memoized "does this directory hold configuration?" probe.
//!
//! Two memo tables are kept: the raw per-directory answer, and the outcome
//! of an upward walk from a directory (the nearest configured ancestor).
//! Every directory visited by a walk records the walk's answer, so a walk
//! from a sibling file stops as soon as it reaches a visited directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use stylescope_config::is_config_file_name;
use tracing::debug;

use crate::lock;

/// Memoized configuration-file probe, scoped to one resolver generation.
#[derive(Debug, Default)]
pub struct DirectoryProbe {
    has_config: Mutex<HashMap<PathBuf, bool>>,
    nearest: Mutex<HashMap<PathBuf, Option<PathBuf>>>,
    listings: AtomicUsize,
}

impl DirectoryProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `dir` directly contains a recognized configuration file.
    ///
    /// Listing failures count as "no".
    pub async fn contains_config(&self, dir: &Path) -> bool {
        let cached = lock(&self.has_config).get(dir).copied();
        if let Some(known) = cached {
            return known;
        }

        self.listings.fetch_add(1, Ordering::Relaxed);
        let found = match tokio::fs::read_dir(dir).await {
            Ok(mut entries) => {
                let mut found = false;
                loop {
                    match entries.next_entry().await {
                        Ok(Some(entry)) => {
                            if entry.file_name().to_str().is_some_and(is_config_file_name) {
                                found = true;
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            debug!(dir = %dir.display(), error = %e, "Directory listing interrupted");
                            break;
                        }
                    }
                }
                found
            }
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Directory not listable, treating as unconfigured");
                false
            }
        };

        lock(&self.has_config).insert(dir.to_path_buf(), found);
        found
    }

    /// Walk up from `start` to `root` (inclusive) and return the first
    /// directory containing configuration.
    ///
    /// Directories outside `root` are never probed.
    pub async fn nearest_config_dir(&self, start: &Path, root: &Path) -> Option<PathBuf> {
        let mut visited = Vec::new();
        let mut dir = start.to_path_buf();

        let found = loop {
            if !dir.starts_with(root) {
                break None;
            }
            let cached = lock(&self.nearest).get(&dir).cloned();
            if let Some(known) = cached {
                break known;
            }
            visited.push(dir.clone());
            if self.contains_config(&dir).await {
                break Some(dir);
            }
            if dir == root {
                break None;
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break None,
            }
        };

        let mut nearest = lock(&self.nearest);
        for visited_dir in visited {
            nearest.insert(visited_dir, found.clone());
        }
        found
    }

    /// Number of directory listings performed (cache misses).
    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::Relaxed)
    }
}
