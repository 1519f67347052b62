//! Per-repository single-flight guard.
//!
//! At most one generation runs per repository. Pushes arriving mid-run are
//! coalesced into a single pending follow-up: later pushes replace it with
//! the union of the accumulated change sets, the newest state winning per
//! path.

use std::collections::HashMap;
use std::sync::Mutex;

use docsmith_core::ChangedFile;

#[derive(Debug, Default)]
struct FlightState {
    running: bool,
    pending: Option<Vec<ChangedFile>>,
}

/// What happened when a caller tried to enter a run.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightOutcome {
    /// The caller now owns the flight and must run.
    Started,
    /// A run is active; the change set (if any) was coalesced for later.
    Coalesced,
}

#[derive(Default)]
pub struct SingleFlight {
    states: Mutex<HashMap<String, FlightState>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to begin a full run (no change set). While a run is active the
    /// request is simply absorbed — a full regeneration is already implied
    /// by whatever run follows.
    pub fn begin(&self, repo_name: &str) -> FlightOutcome {
        let mut states = self.states.lock().expect("single-flight lock poisoned");
        let state = states.entry(repo_name.to_string()).or_default();
        if state.running {
            return FlightOutcome::Coalesced;
        }
        state.running = true;
        FlightOutcome::Started
    }

    /// Try to begin an incremental run for `changes`. While a run is
    /// active, the changes merge into the pending follow-up instead.
    pub fn begin_or_queue(&self, repo_name: &str, changes: Vec<ChangedFile>) -> FlightOutcome {
        let mut states = self.states.lock().expect("single-flight lock poisoned");
        let state = states.entry(repo_name.to_string()).or_default();
        if state.running {
            let merged = merge_changes(state.pending.take(), changes);
            state.pending = Some(merged);
            return FlightOutcome::Coalesced;
        }
        state.running = true;
        FlightOutcome::Started
    }

    /// Mark the active run finished. When a pending follow-up exists the
    /// flight stays owned and its change set is returned so the caller can
    /// run again without releasing the guard.
    pub fn finish(&self, repo_name: &str) -> Option<Vec<ChangedFile>> {
        let mut states = self.states.lock().expect("single-flight lock poisoned");
        let Some(state) = states.get_mut(repo_name) else {
            return None;
        };
        match state.pending.take() {
            Some(changes) => Some(changes),
            None => {
                states.remove(repo_name);
                None
            }
        }
    }

    pub fn is_running(&self, repo_name: &str) -> bool {
        self.states
            .lock()
            .expect("single-flight lock poisoned")
            .get(repo_name)
            .map(|s| s.running)
            .unwrap_or(false)
    }
}

/// Union of two change sets, newest state per path winning.
fn merge_changes(pending: Option<Vec<ChangedFile>>, newer: Vec<ChangedFile>) -> Vec<ChangedFile> {
    let mut merged: Vec<ChangedFile> = pending.unwrap_or_default();
    for change in newer {
        if let Some(existing) = merged.iter_mut().find(|c| c.path == change.path) {
            *existing = change;
        } else {
            merged.push(change);
        }
    }
    merged
}
