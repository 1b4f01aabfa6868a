use crate::{Branch, Candidate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write the current run state to durable storage.
    PersistRun,
    /// Remove the run state from durable storage.
    ClearRun,
    /// Leave the current context. Always preceded by `PersistRun` or `ClearRun`.
    Navigate { navigable_ref: String },
    /// Single mode: hand the listed branches to the operator.
    ExposeBranches(Vec<Branch>),
    /// Remember which candidate answered a query.
    RecordMatch { query: String, candidate_id: String },
    Highlight { candidate: Candidate, label: String },
    RecordOutcome(RunOutcome),
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub found: bool,
    pub label: String,
}
