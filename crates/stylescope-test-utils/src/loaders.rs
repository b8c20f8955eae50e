//! Instrumented [`ConfigLoader`]s.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use stylescope_config::{ConfigError, LoadedConfig};
use stylescope_core::{BoxFuture, ConfigLoader, FsConfigLoader};
use tokio::sync::{Semaphore, watch};

/// Counts loads per directory, delegating to the file-system loader.
pub struct CountingLoader {
    inner: Arc<dyn ConfigLoader>,
    total: AtomicUsize,
    per_dir: Mutex<HashMap<PathBuf, usize>>,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self::wrapping(Arc::new(FsConfigLoader))
    }

    pub fn wrapping(inner: Arc<dyn ConfigLoader>) -> Self {
        Self {
            inner,
            total: AtomicUsize::new(0),
            per_dir: Mutex::new(HashMap::new()),
        }
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, dir: &Path) -> usize {
        self.per_dir
            .lock()
            .expect("loader counter poisoned")
            .get(dir)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for CountingLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for CountingLoader {
    fn load<'a>(
        &'a self,
        dir: &'a Path,
    ) -> BoxFuture<'a, Result<Option<LoadedConfig>, ConfigError>> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .per_dir
            .lock()
            .expect("loader counter poisoned")
            .entry(dir.to_path_buf())
            .or_default() += 1;
        self.inner.load(dir)
    }
}

/// A counting loader that parks every load until the test lets it through.
///
/// ```ignore
/// let loader = Arc::new(GatedLoader::new());
/// // start loads ...
/// loader.wait_entered(1).await;
/// loader.open();
/// ```
pub struct GatedLoader {
    counting: CountingLoader,
    gate: Semaphore,
    entered_tx: watch::Sender<usize>,
    only: Option<PathBuf>,
}

impl GatedLoader {
    pub fn new() -> Self {
        let (entered_tx, _) = watch::channel(0);
        Self {
            counting: CountingLoader::new(),
            gate: Semaphore::new(0),
            entered_tx,
            only: None,
        }
    }

    /// Park loads of `dir` only; every other directory loads straight away
    /// and is not counted by [`wait_entered`](Self::wait_entered).
    pub fn only(dir: impl Into<PathBuf>) -> Self {
        Self {
            only: Some(dir.into()),
            ..Self::new()
        }
    }

    /// Let exactly one parked (or future) load through.
    pub fn release_one(&self) {
        self.gate.add_permits(1);
    }

    /// Let every load through from now on.
    pub fn open(&self) {
        self.gate.close();
    }

    /// Wait until at least `n` loads have reached the gate.
    pub async fn wait_entered(&self, n: usize) {
        let mut rx = self.entered_tx.subscribe();
        rx.wait_for(|entered| *entered >= n)
            .await
            .expect("gate sender dropped");
    }

    pub fn total(&self) -> usize {
        self.counting.total()
    }

    pub fn calls_for(&self, dir: &Path) -> usize {
        self.counting.calls_for(dir)
    }
}

impl Default for GatedLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for GatedLoader {
    fn load<'a>(
        &'a self,
        dir: &'a Path,
    ) -> BoxFuture<'a, Result<Option<LoadedConfig>, ConfigError>> {
        Box::pin(async move {
            if self.only.as_deref().is_none_or(|only| only == dir) {
                self.entered_tx.send_modify(|entered| *entered += 1);
                // A closed gate means "open": acquire fails and the load proceeds.
                if let Ok(permit) = self.gate.acquire().await {
                    permit.forget();
                }
            }
            self.counting.load(dir).await
        })
    }
}
