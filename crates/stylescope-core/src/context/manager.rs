//! Context discovery, loading and lifetime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use globset::GlobSet;
use stylescope_config::{ConfigError, MatchType, Settings};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::inflight::{self, InFlightLoads, LoadOutcome, Ticket};
use super::{Context, ContextError, ContextEvent};
use crate::engine::{AutocompleteOptions, EngineFactory};
use crate::loader::ConfigLoader;
use crate::probe::DirectoryProbe;
use crate::{lock, read, write};

const EVENT_CAPACITY: usize = 64;

/// Every memo table that a reload must clear, swapped as one unit.
struct Generation {
    id: u64,
    /// `None` marks a directory known to have no configuration.
    store: Mutex<HashMap<PathBuf, Option<Arc<Context>>>>,
    resolved: Mutex<HashMap<PathBuf, Option<Arc<Context>>>>,
    probe: DirectoryProbe,
    inflight: InFlightLoads,
}

impl Generation {
    fn new(id: u64) -> Self {
        Self {
            id,
            store: Mutex::new(HashMap::new()),
            resolved: Mutex::new(HashMap::new()),
            probe: DirectoryProbe::new(),
            inflight: InFlightLoads::default(),
        }
    }

    fn stored(&self, dir: &Path) -> Option<Option<Arc<Context>>> {
        lock(&self.store).get(dir).cloned()
    }

    fn loaded(&self) -> Vec<Arc<Context>> {
        lock(&self.store).values().flatten().cloned().collect()
    }
}

/// Resolves the governing [`Context`] for files under one workspace root.
pub struct ContextManager {
    root: PathBuf,
    loader: Arc<dyn ConfigLoader>,
    engines: Arc<dyn EngineFactory>,
    exclude: GlobSet,
    autocomplete: RwLock<AutocompleteOptions>,
    /// Held while autocomplete engines are rebuilt for a new match type.
    rebuild: Mutex<()>,
    current: RwLock<Arc<Generation>>,
    next_generation: AtomicU64,
    events: broadcast::Sender<ContextEvent>,
}

impl ContextManager {
    /// Create a manager for `root`. Nothing is loaded until [`reload`] or the
    /// first resolution.
    ///
    /// [`reload`]: Self::reload
    pub fn new(
        root: impl Into<PathBuf>,
        loader: Arc<dyn ConfigLoader>,
        engines: Arc<dyn EngineFactory>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            root: root.into(),
            loader,
            engines,
            exclude: GlobSet::empty(),
            autocomplete: RwLock::new(AutocompleteOptions::default()),
            rebuild: Mutex::new(()),
            current: RwLock::new(Arc::new(Generation::new(0))),
            next_generation: AtomicU64::new(1),
            events,
        }
    }

    /// Paths matching `exclude` never get a context.
    pub fn with_exclude(mut self, exclude: GlobSet) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_autocomplete(self, options: AutocompleteOptions) -> Self {
        *write(&self.autocomplete) = options;
        self
    }

    /// Create a manager configured from integration settings.
    pub fn from_settings(
        root: impl Into<PathBuf>,
        settings: &Settings,
        loader: Arc<dyn ConfigLoader>,
        engines: Arc<dyn EngineFactory>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(root, loader, engines)
            .with_exclude(settings.exclude_set()?)
            .with_autocomplete(AutocompleteOptions::from(&settings.autocomplete)))
    }

    fn current(&self) -> Arc<Generation> {
        Arc::clone(&read(&self.current))
    }

    /// Drop every context and memo table and eagerly load the root context.
    ///
    /// If the root configuration fails to load the root still gets a default
    /// context, and the error is returned.
    pub async fn reload(&self) -> Result<Arc<Context>, ContextError> {
        let id = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let generation = Arc::new(Generation::new(id));
        *write(&self.current) = Arc::clone(&generation);
        info!(generation = id, root = %self.root.display(), "Reloading workspace contexts");
        let _ = self.events.send(ContextEvent::Reloaded { generation: id });

        match self.load_in(&generation, &self.root, true).await {
            Ok(Some(context)) => Ok(context),
            Ok(None) => Ok(self.install_default(&generation, &self.root)),
            Err(e) => {
                warn!(generation = id, error = %e, "Root configuration failed, using defaults");
                self.install_default(&generation, &self.root);
                Err(e)
            }
        }
    }

    fn install_default(&self, generation: &Generation, dir: &Path) -> Arc<Context> {
        let options = *read(&self.autocomplete);
        let context = Arc::new(Context::build(
            dir.to_path_buf(),
            generation.id,
            None,
            self.engines.as_ref(),
            options,
        ));
        lock(&generation.store).insert(dir.to_path_buf(), Some(Arc::clone(&context)));
        context
    }

    /// The context governing `file_path`, if any.
    ///
    /// The closer of the nearest loaded ancestor context and the nearest
    /// ancestor directory that holds configuration wins; the root context is
    /// the fallback. `_content` is not inspected.
    pub async fn resolve_closest_context(
        &self,
        _content: &str,
        file_path: &Path,
    ) -> Option<Arc<Context>> {
        if self.is_excluded(file_path) {
            debug!(file = %file_path.display(), "Path excluded from resolution");
            return None;
        }

        let generation = self.current();
        let cached = lock(&generation.resolved).get(file_path).cloned();
        if let Some(hit) = cached {
            return hit;
        }

        let file_dir = file_path.parent().unwrap_or(file_path);

        let loaded = generation
            .loaded()
            .into_iter()
            .filter(|ctx| ctx.governs(file_dir))
            .max_by_key(|ctx| depth(ctx.config_dir()));

        let probed = generation.probe.nearest_config_dir(file_dir, &self.root).await;

        let mut resolved = None;
        if let Some(dir) = probed {
            let closer = loaded
                .as_ref()
                .is_none_or(|ctx| depth(&dir) > depth(ctx.config_dir()));
            if closer {
                match self.load_in(&generation, &dir, false).await {
                    Ok(found) => resolved = found,
                    Err(e) => debug!(dir = %dir.display(), error = %e, "Falling back past failed directory"),
                }
            }
        }

        let resolved = match resolved.or(loaded) {
            Some(ctx) => Some(ctx),
            None => match self.load_in(&generation, &self.root, true).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(generation = generation.id, error = %e, "Root configuration failed, using defaults");
                    Some(self.install_default(&generation, &self.root))
                }
            },
        };

        debug!(
            file = %file_path.display(),
            context = ?resolved.as_ref().map(|ctx| ctx.config_dir().to_path_buf()),
            generation = generation.id,
            "Resolved file context"
        );
        lock(&generation.resolved).insert(file_path.to_path_buf(), resolved.clone());
        resolved
    }

    /// Load (or join the running load of) the context for `dir`.
    ///
    /// `Ok(None)` when `dir` has no configuration and `allow_default` is
    /// false; such directories are remembered and never get a context.
    pub async fn load_context_in_directory(
        &self,
        dir: &Path,
        allow_default: bool,
    ) -> Result<Option<Arc<Context>>, ContextError> {
        let generation = self.current();
        self.load_in(&generation, dir, allow_default).await
    }

    async fn load_in(&self, generation: &Generation, dir: &Path, allow_default: bool) -> LoadOutcome {
        loop {
            match generation.stored(dir) {
                Some(Some(context)) => return Ok(Some(context)),
                Some(None) if !allow_default => return Ok(None),
                _ => {}
            }

            match generation.inflight.join(dir) {
                Ticket::Leader(guard) => {
                    // A leader may have finished between the store check and
                    // the join.
                    match generation.stored(dir) {
                        Some(Some(context)) => return guard.complete(Ok(Some(context))),
                        Some(None) if !allow_default => return guard.complete(Ok(None)),
                        _ => {}
                    }
                    let outcome = self.perform_load(generation, dir, allow_default).await;
                    return guard.complete(outcome);
                }
                Ticket::Waiter(rx) => match inflight::wait(rx, dir).await {
                    Ok(None) if allow_default => continue,
                    Err(ContextError::Abandoned { .. }) => {
                        debug!(dir = %dir.display(), "Load leader went away, retrying");
                        continue;
                    }
                    outcome => return outcome,
                },
            }
        }
    }

    async fn perform_load(&self, generation: &Generation, dir: &Path, allow_default: bool) -> LoadOutcome {
        debug!(dir = %dir.display(), allow_default, generation = generation.id, "Loading configuration");
        let loaded = match self.loader.load(dir).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to load configuration");
                let err = ContextError::Load {
                    dir: dir.to_path_buf(),
                    source: Arc::new(e),
                };
                let _ = self.events.send(ContextEvent::LoadFailed {
                    dir: dir.to_path_buf(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        if loaded.is_none() && !allow_default {
            debug!(dir = %dir.display(), "No configuration found, marking absent");
            lock(&generation.store).insert(dir.to_path_buf(), None);
            return Ok(None);
        }

        let options = *read(&self.autocomplete);
        let context = Arc::new(Context::build(
            dir.to_path_buf(),
            generation.id,
            loaded,
            self.engines.as_ref(),
            options,
        ));
        lock(&generation.store).insert(dir.to_path_buf(), Some(Arc::clone(&context)));

        // The match mode may have changed while the context was being built.
        {
            let _rebuild = lock(&self.rebuild);
            let latest = *read(&self.autocomplete);
            if latest != options {
                context.rebuild_autocomplete(self.engines.as_ref(), latest);
            }
        }

        if self.is_current(&context) {
            info!(
                dir = %dir.display(),
                sources = context.config_sources().len(),
                defaulted = context.is_default(),
                generation = generation.id,
                "Context loaded"
            );
            let _ = self.events.send(ContextEvent::ContextLoaded {
                config_dir: dir.to_path_buf(),
                sources: context.config_sources().to_vec(),
                generation: generation.id,
            });
        } else {
            debug!(dir = %dir.display(), generation = generation.id, "Load finished after reload, discarded");
        }
        Ok(Some(context))
    }

    /// Whether `file_path` belongs to this workspace: true when nothing is
    /// loaded yet, or when the path lies under a loaded context.
    pub fn is_target(&self, file_path: &Path) -> bool {
        let loaded = self.current().loaded();
        loaded.is_empty() || loaded.iter().any(|ctx| ctx.governs(file_path))
    }

    /// Switch the autocomplete match mode, rebuilding every loaded context's
    /// autocomplete engine. Returns `false` if the mode was already active.
    pub fn set_autocomplete_match_type(&self, match_type: MatchType) -> bool {
        let _rebuild = lock(&self.rebuild);
        let options = {
            let mut options = write(&self.autocomplete);
            if options.match_type == match_type {
                return false;
            }
            options.match_type = match_type;
            *options
        };
        let contexts = self.current().loaded();
        for context in &contexts {
            context.rebuild_autocomplete(self.engines.as_ref(), options);
        }
        info!(%match_type, contexts = contexts.len(), "Autocomplete match type changed");
        true
    }

    pub fn autocomplete_options(&self) -> AutocompleteOptions {
        *read(&self.autocomplete)
    }

    /// Loaded contexts of the current generation, ordered by directory.
    pub fn contexts(&self) -> Vec<Arc<Context>> {
        let mut contexts = self.current().loaded();
        contexts.sort_by(|a, b| a.config_dir().cmp(b.config_dir()));
        contexts
    }

    /// Every configuration file behind a loaded context.
    pub fn config_sources(&self) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = self
            .contexts()
            .iter()
            .flat_map(|ctx| ctx.config_sources().iter().cloned())
            .collect();
        sources.sort();
        sources.dedup();
        sources
    }

    pub fn is_config_source(&self, path: &Path) -> bool {
        self.current()
            .loaded()
            .iter()
            .any(|ctx| ctx.config_sources().iter().any(|source| source == path))
    }

    /// Current generation id.
    pub fn generation(&self) -> u64 {
        read(&self.current).id
    }

    /// Whether `context` was built by the current generation.
    pub fn is_current(&self, context: &Context) -> bool {
        context.generation() == self.generation()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths under the root are matched relative to it, others as given.
    pub fn is_excluded(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(relative) => self.exclude.is_match(relative),
            Err(_) => self.exclude.is_match(path),
        }
    }

    /// Directory listings performed by the current generation's probe.
    pub fn probe_listings(&self) -> usize {
        self.current().probe.listing_count()
    }
}

fn depth(path: &Path) -> usize {
    path.components().count()
}
