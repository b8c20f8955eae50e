//! Instrumented [`TokenScan`]s.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use stylescope_core::{Context, MatchedPosition, Strictness, TokenMatcher, TokenScan};

/// Delegates to [`TokenMatcher`] and counts invocations.
#[derive(Debug, Default)]
pub struct CountingScanner {
    calls: AtomicUsize,
}

impl CountingScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenScan for CountingScanner {
    fn scan(&self, context: &Context, text: &str, strictness: Strictness) -> Vec<MatchedPosition> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        TokenMatcher.scan(context, text, strictness)
    }
}

#[derive(Debug, Default)]
struct GateState {
    entered: usize,
    open: bool,
}

/// A scanner that blocks the calling thread in every scan until the test
/// opens the gate.
///
/// Scans run synchronously under the cache's per-key lock, so drive it from
/// plain threads (or a multi-threaded runtime).
#[derive(Debug, Default)]
pub struct GatedScanner {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl GatedScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let every parked and future scan through.
    pub fn open(&self) {
        self.state.lock().expect("scanner gate poisoned").open = true;
        self.changed.notify_all();
    }

    /// Block until at least `n` scans have started.
    pub fn wait_entered(&self, n: usize) {
        let state = self.state.lock().expect("scanner gate poisoned");
        let _state = self
            .changed
            .wait_while(state, |state| state.entered < n)
            .expect("scanner gate poisoned");
    }

    pub fn entered(&self) -> usize {
        self.state.lock().expect("scanner gate poisoned").entered
    }
}

impl TokenScan for GatedScanner {
    fn scan(&self, context: &Context, text: &str, strictness: Strictness) -> Vec<MatchedPosition> {
        {
            let mut state = self.state.lock().expect("scanner gate poisoned");
            state.entered += 1;
            self.changed.notify_all();
            let _state = self
                .changed
                .wait_while(state, |state| !state.open)
                .expect("scanner gate poisoned");
        }
        TokenMatcher.scan(context, text, strictness)
    }
}
