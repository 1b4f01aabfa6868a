use crate::{Branch, Candidate, RunMode, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Operator asked for a new search; replaces any active run.
    StartRequested {
        query: String,
        mode: RunMode,
        now: Timestamp,
        /// Where the search begins.
        search_ref: String,
    },
    /// Operator asked to stop; the result cache is left alone.
    StopRequested,
    /// Branches extracted from a search listing, deduplicated and in page order.
    BranchesListed(Vec<Branch>),
    /// Operator picked one of the offered branches.
    BranchSelected(usize),
    /// A branch page was resolved to its leaf collection, or to nothing.
    LeafCollectionResolved(Option<String>),
    /// A cached candidate id was located on the leaf collection.
    CacheHit(Candidate),
    /// The probe pool finished this leaf collection.
    LeafScanFinished { matched: Option<Candidate> },
    NoOp,
}
