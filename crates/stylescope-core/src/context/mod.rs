//! Contexts: one configured generator/autocomplete pair per configuration
//! directory, and the manager that discovers and owns them.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                 ContextManager                    │
//! │                                                   │
//! │  current: Arc<Generation> ── swapped by reload()  │
//! │  ┌──────────────────────────────────────────────┐ │
//! │  │ Generation                                   │ │
//! │  │  ·store     dir  → Context | absent          │ │
//! │  │  ·resolved  file → Context | none            │ │
//! │  │  ·probe     dir  → nearest configured dir    │ │
//! │  │  ·inflight  dir  → pending load (watch)      │ │
//! │  └──────────────────────────────────────────────┘ │
//! │          │                     ▲                  │
//! │          ▼                     │                  │
//! │   ConfigLoader ──▶ EngineFactory ──▶ Context      │
//! └───────────────────────────────────────────────────┘
//! ```

mod inflight;
pub mod manager;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use stylescope_config::{ConfigError, LoadedConfig, UserConfig};

use crate::engine::{Autocomplete, AutocompleteOptions, EngineFactory, Generator};
use crate::matcher::{RegexTransform, TransformHook};
use crate::{read, write};

pub use manager::ContextManager;

/// One fully initialized configuration scope.
pub struct Context {
    config_dir: PathBuf,
    generation: u64,
    config: UserConfig,
    config_sources: Vec<PathBuf>,
    defaulted: bool,
    generator: Arc<dyn Generator>,
    autocomplete: RwLock<Arc<dyn Autocomplete>>,
    transformers: Vec<Arc<dyn TransformHook>>,
}

impl Context {
    /// Build a context for `config_dir`. `None` builds the default
    /// configuration with no sources.
    pub fn build(
        config_dir: PathBuf,
        generation: u64,
        loaded: Option<LoadedConfig>,
        engines: &dyn EngineFactory,
        options: AutocompleteOptions,
    ) -> Self {
        let (config, config_sources, defaulted) = match loaded {
            Some(loaded) => (loaded.config, loaded.sources, false),
            None => (UserConfig::fallback(), Vec::new(), true),
        };
        let generator = engines.configure(&config);
        let autocomplete = engines.autocomplete(Arc::clone(&generator), options);
        let transformers = config
            .transformers
            .iter()
            .map(|t| Arc::new(RegexTransform::from_config(t)) as Arc<dyn TransformHook>)
            .collect();

        Self {
            config_dir,
            generation,
            config,
            config_sources,
            defaulted,
            generator,
            autocomplete: RwLock::new(autocomplete),
            transformers,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// The resolver generation that built this context.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    /// Files the configuration was built from, primary file first.
    pub fn config_sources(&self) -> &[PathBuf] {
        &self.config_sources
    }

    /// Whether this context runs on the default configuration.
    pub fn is_default(&self) -> bool {
        self.defaulted
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// The current autocomplete engine. Replaced in place when the match
    /// mode changes, so callers should not hold on to it.
    pub fn autocomplete(&self) -> Arc<dyn Autocomplete> {
        Arc::clone(&read(&self.autocomplete))
    }

    pub fn transformers(&self) -> &[Arc<dyn TransformHook>] {
        &self.transformers
    }

    /// Whether `path` is this context's directory or lies under it.
    pub fn governs(&self, path: &Path) -> bool {
        path.starts_with(&self.config_dir)
    }

    pub(crate) fn rebuild_autocomplete(&self, engines: &dyn EngineFactory, options: AutocompleteOptions) {
        let rebuilt = engines.autocomplete(Arc::clone(&self.generator), options);
        *write(&self.autocomplete) = rebuilt;
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config_dir", &self.config_dir)
            .field("generation", &self.generation)
            .field("config_sources", &self.config_sources)
            .field("defaulted", &self.defaulted)
            .field("transformers", &self.transformers.len())
            .finish_non_exhaustive()
    }
}

/// Notifications published by the [`ContextManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEvent {
    /// A new generation replaced the previous one.
    Reloaded { generation: u64 },
    /// A context was built and registered.
    ContextLoaded {
        config_dir: PathBuf,
        sources: Vec<PathBuf>,
        generation: u64,
    },
    /// Loading configuration for `dir` failed.
    LoadFailed { dir: PathBuf, reason: String },
}

/// Errors from context loading.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
    #[error("failed to load configuration in {}: {source}", dir.display())]
    Load {
        dir: PathBuf,
        #[source]
        source: Arc<ConfigError>,
    },

    #[error("configuration load for {} was abandoned", dir.display())]
    Abandoned { dir: PathBuf },
}

impl ContextError {
    /// The directory the failed load was for.
    pub fn dir(&self) -> &Path {
        match self {
            Self::Load { dir, .. } | Self::Abandoned { dir } => dir,
        }
    }
}
