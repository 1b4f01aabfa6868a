//! Locator engine: durable run state, page extraction, probing and effect execution.
mod cache;
mod context;
mod decode;
mod extract;
mod fetch;
mod fields;
mod orchestrator;
mod persist;
mod pool;
mod probe;
mod run_store;
mod settings;
mod store;
mod types;

pub use cache::{CacheEntry, ResultCache, RESULT_CACHE_KEY};
pub use context::{
    Highlighter, HttpPage, Navigator, PageContentProvider, PageContext, StaticPage,
};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use extract::{anchor_of, anchored_row_text, resolve_reference, PageExtractor};
pub use fetch::{FetchSettings, RequestProfile, ReqwestFetcher};
pub use fields::FieldExtractor;
pub use orchestrator::{Clock, Collaborators, Orchestrator, ResumeOutcome, StatusReport};
pub use persist::{ensure_state_dir, AtomicFileWriter, PersistError};
pub use pool::{PoolOutcome, ProbePool};
pub use probe::{CandidateProber, HttpProber, MatchPolicy, ProbeSettings, ProbeVerdict, TwoTierProber};
pub use run_store::{LastOutcome, RunStateStore, LAST_OUTCOME_KEY, RUN_STATE_KEY};
pub use settings::LocatorSettings;
pub use store::{DurableStore, FileStore, MemoryStore, StoreError};
pub use types::{EngineError, FailureKind, FetchError, FetchMetadata, FetchOutput};
