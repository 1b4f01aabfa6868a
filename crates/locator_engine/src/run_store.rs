use std::sync::Arc;

use locator_core::{RunState, Timestamp};
use serde::{Deserialize, Serialize};

use crate::store::{load_record, save_record, DurableStore, StoreError};

pub const RUN_STATE_KEY: &str = "run_state_v1";
pub const LAST_OUTCOME_KEY: &str = "last_outcome_v1";

/// Summary of the most recent finished run, kept for the status view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOutcome {
    pub recorded_at: Timestamp,
    pub found: bool,
    pub label: String,
}

/// Persists the single active [`RunState`] under a fixed key.
///
/// The whole record is written at once, so a reset between two saves leaves
/// either the old or the new record, never a mix.
#[derive(Clone)]
pub struct RunStateStore {
    store: Arc<dyn DurableStore>,
}

impl RunStateStore {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<Option<RunState>, StoreError> {
        load_record(self.store.as_ref(), RUN_STATE_KEY)
    }

    pub fn save(&self, state: &RunState) -> Result<(), StoreError> {
        save_record(self.store.as_ref(), RUN_STATE_KEY, state)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.delete(RUN_STATE_KEY)
    }

    pub fn last_outcome(&self) -> Result<Option<LastOutcome>, StoreError> {
        load_record(self.store.as_ref(), LAST_OUTCOME_KEY)
    }

    pub fn record_outcome(&self, outcome: &LastOutcome) -> Result<(), StoreError> {
        save_record(self.store.as_ref(), LAST_OUTCOME_KEY, outcome)
    }

    pub fn clear_outcome(&self) -> Result<(), StoreError> {
        self.store.delete(LAST_OUTCOME_KEY)
    }
}
