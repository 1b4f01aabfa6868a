use crate::{RunMode, RunStatus, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunView {
    pub query: String,
    pub mode: RunMode,
    pub status: RunStatus,
    pub current_branch: Option<String>,
    pub queued: usize,
    pub offered: Vec<String>,
    pub started_at: Timestamp,
}
