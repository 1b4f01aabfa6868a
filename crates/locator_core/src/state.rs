use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::view_model::RunView;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    /// Stop at a listing with several branches and let the operator pick one.
    #[default]
    Single,
    /// Visit every listed branch in order until one of them holds the record.
    ScanAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    #[default]
    Idle,
    Searching,
    /// Single mode: several branches were listed and one must be chosen.
    AwaitingSelection,
    LeafScanning,
    Found,
    NotFound,
}

impl RunStatus {
    /// Whether a run in this status still has work to do after a context reset.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunStatus::Searching | RunStatus::AwaitingSelection | RunStatus::LeafScanning
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Found | RunStatus::NotFound)
    }
}

/// An intermediate grouping discovered on a listing page. Identity is `navigable_ref`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub navigable_ref: String,
    pub label: String,
    pub id: String,
}

/// Position of an element in a parsed page, as child indices from the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PageAnchor(pub Vec<usize>);

/// A leaf entry that may hold the target record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub navigable_ref: String,
    pub id: String,
    pub anchor: PageAnchor,
}

/// Durable description of one search, spanning any number of context resets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunState {
    pub query: String,
    pub mode: RunMode,
    pub current_branch: Option<Branch>,
    pub remaining_branches: VecDeque<Branch>,
    /// Branches exposed for manual selection while `AwaitingSelection`.
    pub offered_branches: Vec<Branch>,
    pub started_at: Timestamp,
    pub status: RunStatus,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever this state held with a fresh search.
    pub fn start(&mut self, query: impl Into<String>, mode: RunMode, now: Timestamp) {
        *self = Self {
            query: query.into(),
            mode,
            started_at: now,
            status: RunStatus::Searching,
            ..Self::default()
        };
    }

    pub fn advance_to(&mut self, branch: Branch) {
        self.current_branch = Some(branch);
        self.offered_branches.clear();
        self.status = RunStatus::LeafScanning;
    }

    /// Appends branches to the queue, skipping any whose reference is already queued or current.
    pub fn enqueue(&mut self, branches: impl IntoIterator<Item = Branch>) {
        for branch in branches {
            let known = self
                .current_branch
                .iter()
                .chain(self.remaining_branches.iter())
                .any(|b| b.navigable_ref == branch.navigable_ref);
            if !known {
                self.remaining_branches.push_back(branch);
            }
        }
    }

    pub fn dequeue_next(&mut self) -> Option<Branch> {
        self.remaining_branches.pop_front()
    }

    pub fn offer(&mut self, branches: Vec<Branch>) {
        self.offered_branches = branches;
        self.status = RunStatus::AwaitingSelection;
    }

    pub fn finish(&mut self, status: RunStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.remaining_branches.clear();
        self.offered_branches.clear();
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// A run whose age exceeds `ttl_ms` must be discarded on resume.
    pub fn is_stale(&self, now: Timestamp, ttl_ms: i64) -> bool {
        now.saturating_sub(self.started_at) > ttl_ms
    }

    pub fn normalized_query(&self) -> String {
        normalize_query(&self.query)
    }

    pub fn view(&self) -> RunView {
        RunView {
            query: self.query.clone(),
            mode: self.mode,
            status: self.status,
            current_branch: self.current_branch.as_ref().map(|b| b.label.clone()),
            queued: self.remaining_branches.len(),
            offered: self.offered_branches.iter().map(|b| b.label.clone()).collect(),
            started_at: self.started_at,
        }
    }
}

/// Lowercases and collapses whitespace so lookups and comparisons ignore formatting.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(n: u32) -> Branch {
        Branch {
            navigable_ref: format!("https://example.com/b/{n}"),
            label: format!("Branch {n}"),
            id: n.to_string(),
        }
    }

    #[test]
    fn normalize_collapses_case_and_whitespace() {
        assert_eq!(normalize_query("  Alice \t Smith\n"), "alice smith");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn start_discards_previous_run() {
        let mut state = RunState::new();
        state.start("alice", RunMode::ScanAll, 10);
        state.enqueue([branch(1), branch(2)]);
        state.start("bob", RunMode::Single, 20);

        assert_eq!(state.query, "bob");
        assert_eq!(state.status, RunStatus::Searching);
        assert!(state.remaining_branches.is_empty());
        assert_eq!(state.started_at, 20);
    }

    #[test]
    fn enqueue_skips_known_references() {
        let mut state = RunState::new();
        state.advance_to(branch(1));
        state.enqueue([branch(1), branch(2), branch(2), branch(3)]);
        let queued: Vec<_> = state.remaining_branches.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(queued, vec!["2", "3"]);
    }

    #[test]
    fn staleness_is_strictly_beyond_ttl() {
        let mut state = RunState::new();
        state.start("q", RunMode::Single, 1_000);
        assert!(!state.is_stale(1_500, 500));
        assert!(state.is_stale(1_501, 500));
    }
}
