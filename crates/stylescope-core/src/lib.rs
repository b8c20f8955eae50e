#![deny(unsafe_code)]

//! Stylescope core runtime.
//!
//! Resolves which style configuration governs a file in a multi-root
//! workspace, keeps one generator/autocomplete context per configuration
//! directory, and caches the token positions found in each open document.
//! The [`Workspace`] facade is what an editor integration talks to.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A type-erased, `Send`-safe, boxed future for async trait methods that
/// are called through `dyn Trait`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-document match cache.
pub mod cache;
/// Contexts and the manager that discovers and owns them.
pub mod context;
/// Style generation and autocomplete engines.
pub mod engine;
/// Configuration loader seam.
pub mod loader;
/// In-memory log collector for embedding hosts.
pub mod logging;
/// Token scanning.
pub mod matcher;
/// Memoized configuration-file probe.
pub mod probe;
/// Editor-facing facade.
pub mod workspace;

pub use cache::{MatchCache, MatchKey};
pub use context::{Context, ContextError, ContextEvent, ContextManager};
pub use engine::{
    Autocomplete, AutocompleteOptions, EngineFactory, GenerateResult, Generator, RuleEngine,
};
pub use loader::{ConfigLoader, FsConfigLoader};
pub use logging::{LogCollector, LogEntry, LogReader};
pub use matcher::{MatchedPosition, Strictness, TokenMatcher, TokenScan};
pub use probe::DirectoryProbe;
pub use workspace::{TokenInfo, Workspace};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
