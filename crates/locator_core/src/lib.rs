//! Locator core: run state, stage classification and the pure search state machine.
mod effect;
mod msg;
mod stage;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, RunOutcome};
pub use msg::Msg;
pub use stage::{SiteLayout, Stage};
pub use state::{
    normalize_query, Branch, Candidate, PageAnchor, RunMode, RunState, RunStatus, Timestamp,
};
pub use update::update;
pub use view_model::RunView;
