//! Singleflight registry for configuration loads.
//!
//! The first caller for a directory becomes the leader and performs the
//! load; everyone arriving while it runs becomes a waiter and receives the
//! leader's outcome through a `watch` channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::{Context, ContextError};
use crate::lock;

pub(crate) type LoadOutcome = Result<Option<Arc<Context>>, ContextError>;

type Slot = watch::Sender<Option<LoadOutcome>>;

/// Loads currently in progress, keyed by directory.
#[derive(Default)]
pub(crate) struct InFlightLoads {
    slots: Arc<Mutex<HashMap<PathBuf, Arc<Slot>>>>,
}

pub(crate) enum Ticket {
    Leader(LoadGuard),
    Waiter(watch::Receiver<Option<LoadOutcome>>),
}

impl InFlightLoads {
    /// Become the leader for `dir`, or attach to the running load.
    pub(crate) fn join(&self, dir: &Path) -> Ticket {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.get(dir) {
            return Ticket::Waiter(slot.subscribe());
        }
        let (tx, _rx) = watch::channel(None);
        let slot = Arc::new(tx);
        slots.insert(dir.to_path_buf(), Arc::clone(&slot));
        Ticket::Leader(LoadGuard {
            dir: dir.to_path_buf(),
            slots: Arc::clone(&self.slots),
            slot,
            completed: false,
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.slots).len()
    }
}

/// Held by the leader. Publishes the outcome and clears the registry entry;
/// if dropped without completing, waiters get [`ContextError::Abandoned`].
pub(crate) struct LoadGuard {
    dir: PathBuf,
    slots: Arc<Mutex<HashMap<PathBuf, Arc<Slot>>>>,
    slot: Arc<Slot>,
    completed: bool,
}

impl LoadGuard {
    pub(crate) fn complete(mut self, outcome: LoadOutcome) -> LoadOutcome {
        self.completed = true;
        self.finish(outcome.clone());
        outcome
    }

    fn finish(&self, outcome: LoadOutcome) {
        self.slot.send_replace(Some(outcome));
        let mut slots = lock(&self.slots);
        if slots
            .get(&self.dir)
            .is_some_and(|current| Arc::ptr_eq(current, &self.slot))
        {
            slots.remove(&self.dir);
        }
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        self.finish(Err(ContextError::Abandoned {
            dir: self.dir.clone(),
        }));
    }
}

/// Wait for the leader's outcome.
pub(crate) async fn wait(
    mut rx: watch::Receiver<Option<LoadOutcome>>,
    dir: &Path,
) -> LoadOutcome {
    loop {
        let published = rx.borrow_and_update().clone();
        if let Some(outcome) = published {
            return outcome;
        }
        if rx.changed().await.is_err() {
            return Err(ContextError::Abandoned {
                dir: dir.to_path_buf(),
            });
        }
    }
}
