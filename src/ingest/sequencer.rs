//! Turn-taking for ordered slot reservation
//!
//! Workers parse files concurrently but reserve store slots strictly in
//! discovery order, so the records kept under capacity pressure are always the
//! first ones parsed. Copying into the slots happens outside the turn.

use anyhow::{bail, Result};
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct TurnState {
    next: usize,
    abandoned: bool,
}

#[derive(Debug, Default)]
pub(crate) struct TurnSequencer {
    state: Mutex<TurnState>,
    turn_changed: Condvar,
}

impl TurnSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until it is `index`'s turn, run `f`, then hand the turn to `index + 1`.
    ///
    /// The turn advances whatever `f` returns.
    pub fn run_in_turn<T>(&self, index: usize, f: impl FnOnce() -> T) -> Result<T> {
        let mut state = self.lock();
        while state.next != index && !state.abandoned {
            state = match self.turn_changed.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        if state.abandoned {
            bail!("Ingestion aborted while waiting for file #{}", index);
        }

        let out = f();
        state.next = index + 1;
        drop(state);
        self.turn_changed.notify_all();
        Ok(out)
    }

    /// Wake every waiter and make further turns fail
    pub fn abandon(&self) {
        self.lock().abandoned = true;
        self.turn_changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, TurnState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Abandons the sequencer if the owning worker unwinds
pub(crate) struct AbandonOnPanic<'a>(pub &'a TurnSequencer);

impl Drop for AbandonOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abandon();
        }
    }
}
