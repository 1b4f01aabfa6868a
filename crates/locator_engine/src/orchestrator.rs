use std::sync::Arc;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use locator_core::{
    update, Branch, Candidate, Effect, Msg, RunMode, RunState, RunView, Stage, Timestamp,
};
use tokio_util::sync::CancellationToken;

use crate::cache::ResultCache;
use crate::context::{Highlighter, Navigator, PageContext};
use crate::extract::PageExtractor;
use crate::pool::ProbePool;
use crate::probe::{CandidateProber, TwoTierProber};
use crate::run_store::{LastOutcome, RunStateStore};
use crate::settings::LocatorSettings;
use crate::store::DurableStore;
use crate::EngineError;

pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// The external pieces an orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DurableStore>,
    pub prober: Arc<dyn CandidateProber>,
    pub navigator: Arc<dyn Navigator>,
    pub highlighter: Arc<dyn Highlighter>,
}

/// What a call into the orchestrator ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// No active run, or nothing to do.
    Idle,
    /// The stored run was older than the TTL and has been dropped.
    Discarded,
    /// The run is active but this context is not part of the search.
    Unrelated,
    Navigated(String),
    AwaitingSelection(Vec<Branch>),
    Found { candidate: Candidate, label: String },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub run: Option<RunView>,
    pub last_outcome: Option<LastOutcome>,
    pub cached_queries: usize,
}

/// Drives one search across context resets.
///
/// An orchestrator is built fresh for every context; everything it knows about
/// the run comes from the durable store, and everything it must remember is
/// written back before it navigates away.
enum ActiveRun {
    None,
    Expired,
    Live(RunState),
}

pub struct Orchestrator {
    settings: LocatorSettings,
    runs: RunStateStore,
    cache: ResultCache,
    extractor: PageExtractor,
    pool: ProbePool,
    navigator: Arc<dyn Navigator>,
    highlighter: Arc<dyn Highlighter>,
    clock: Clock,
    stop: CancellationToken,
}

impl Orchestrator {
    pub fn new(settings: LocatorSettings, collaborators: Collaborators) -> Result<Self, EngineError> {
        let extractor = PageExtractor::new(settings.layout.clone())?;
        let prober = Arc::new(TwoTierProber::new(
            collaborators.prober,
            settings.probe.clone(),
            settings.match_policy,
        ));
        let pool = ProbePool::new(prober, settings.concurrency);
        Ok(Self {
            runs: RunStateStore::new(collaborators.store.clone()),
            cache: ResultCache::new(collaborators.store),
            extractor,
            pool,
            navigator: collaborators.navigator,
            highlighter: collaborators.highlighter,
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis()),
            stop: CancellationToken::new(),
            settings,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Token that ends an in-progress leaf scan when cancelled.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Starts a search, replacing any active run, and navigates to the search listing.
    pub fn start(&self, query: &str, mode: RunMode) -> ResumeOutcome {
        let search_ref = match self.settings.layout.search_url(query.trim()) {
            Ok(search_ref) => search_ref,
            Err(err) => {
                engine_error!("cannot build search reference from {:?}: {}", self.settings.layout.origin, err);
                return ResumeOutcome::Idle;
            }
        };
        engine_info!("starting {:?} search for {:?}", mode, query.trim());
        let msg = Msg::StartRequested {
            query: query.to_string(),
            mode,
            now: (self.clock)(),
            search_ref,
        };
        let (state, effects) = update(RunState::new(), msg);
        self.execute(state, effects)
    }

    /// Drops the active run and ends any scan in progress. The result cache is kept.
    pub fn stop(&self) {
        self.stop.cancel();
        let state = self.load_active().unwrap_or_default();
        let (state, effects) = update(state, Msg::StopRequested);
        if effects.is_empty() {
            // Nothing readable was active; make sure no stale record lingers.
            if let Err(err) = self.runs.clear() {
                engine_warn!("failed to clear run state: {}", err);
            }
        }
        self.execute(state, effects);
        engine_info!("search stopped");
    }

    /// Stops the run and forgets the last outcome. The result cache is kept.
    pub fn clear(&self) {
        self.stop();
        if let Err(err) = self.runs.clear_outcome() {
            engine_warn!("failed to clear last outcome: {}", err);
        }
    }

    /// Picks one of the branches offered in Single mode and navigates to it.
    pub fn select_branch(&self, index: usize) -> ResumeOutcome {
        let Some(state) = self.load_active() else {
            return ResumeOutcome::Idle;
        };
        let (state, effects) = update(state, Msg::BranchSelected(index));
        if effects.is_empty() {
            engine_warn!("no offered branch at index {}", index);
            return ResumeOutcome::Idle;
        }
        self.execute(state, effects)
    }

    pub fn status(&self) -> StatusReport {
        let run = self.load_active().map(|state| state.view());
        let last_outcome = self.runs.last_outcome().unwrap_or_else(|err| {
            engine_warn!("last outcome unreadable: {}", err);
            None
        });
        let cached_queries = self.cache.len().unwrap_or_else(|err| {
            engine_warn!("result cache unreadable: {}", err);
            0
        });
        StatusReport {
            run,
            last_outcome,
            cached_queries,
        }
    }

    /// Entry point for every new context.
    ///
    /// Does nothing, and reads no page content, unless a fresh run is active and
    /// the context is one of the search stages.
    pub async fn resume(&self, context: &PageContext<'_>) -> ResumeOutcome {
        let state = match self.load_run() {
            ActiveRun::Live(state) => state,
            ActiveRun::Expired => return ResumeOutcome::Discarded,
            ActiveRun::None => return ResumeOutcome::Idle,
        };

        let stage = self.settings.layout.classify(context.navigable_ref);
        engine_debug!("context {} classified as {:?}", context.navigable_ref, stage);

        let msg = match stage {
            Stage::Unrelated => return ResumeOutcome::Unrelated,
            Stage::BranchDetail => Msg::LeafCollectionResolved(
                self.settings.layout.leaf_collection_for(context.navigable_ref),
            ),
            Stage::SearchRoot => {
                let Some(html) = self.read_page(context).await else {
                    return ResumeOutcome::Idle;
                };
                let branches = self.extractor.extract_branches(&html, context.navigable_ref);
                engine_info!("search listing offers {} branches", branches.len());
                Msg::BranchesListed(branches)
            }
            Stage::LeafCollection => {
                let Some(html) = self.read_page(context).await else {
                    return ResumeOutcome::Idle;
                };
                match self.scan_leaf_collection(&state, &html, context.navigable_ref).await {
                    Some(msg) => msg,
                    None => return ResumeOutcome::Idle,
                }
            }
        };

        let (state, effects) = update(state, msg);
        self.execute(state, effects)
    }

    async fn scan_leaf_collection(
        &self,
        state: &RunState,
        html: &str,
        page_ref: &str,
    ) -> Option<Msg> {
        let query = state.normalized_query();
        match self.cache.lookup(&query) {
            Ok(Some(candidate_id)) => {
                return Some(
                    match self.extractor.locate_candidate(html, page_ref, &candidate_id) {
                        Some(candidate) => {
                            engine_info!("cache hit for {:?}: id {}", query, candidate_id);
                            Msg::CacheHit(candidate)
                        }
                        None => {
                            engine_info!(
                                "cached id {} for {:?} is not listed here",
                                candidate_id,
                                query
                            );
                            Msg::LeafScanFinished { matched: None }
                        }
                    },
                );
            }
            Ok(None) => {}
            Err(err) => engine_warn!("result cache unreadable, scanning: {}", err),
        }

        let candidates = self.extractor.extract_candidates(html, page_ref);
        engine_info!("leaf collection lists {} candidates", candidates.len());
        if candidates.is_empty() {
            return Some(Msg::LeafScanFinished { matched: None });
        }

        let outcome = self.pool.run(candidates, &query, &self.stop).await;
        if self.stop.is_cancelled() {
            engine_info!("scan stopped after {} candidates", outcome.probed);
            return None;
        }
        engine_info!(
            "scan finished after {} candidates, found: {}",
            outcome.probed,
            outcome.found()
        );
        Some(Msg::LeafScanFinished {
            matched: outcome.matched,
        })
    }

    async fn read_page(&self, context: &PageContext<'_>) -> Option<String> {
        match context.content.page_content().await {
            Ok(html) => Some(html),
            Err(err) => {
                engine_warn!("cannot read {}: {}", context.navigable_ref, err);
                None
            }
        }
    }

    fn load_active(&self) -> Option<RunState> {
        match self.load_run() {
            ActiveRun::Live(state) => Some(state),
            ActiveRun::Expired | ActiveRun::None => None,
        }
    }

    /// Read failures count as "no active run". A run older than the TTL is
    /// cleared here, so no entry point ever acts on it.
    fn load_run(&self) -> ActiveRun {
        let state = match self.runs.load() {
            Ok(Some(state)) if state.is_active() => state,
            Ok(_) => return ActiveRun::None,
            Err(err) => {
                engine_warn!("run state unreadable, treating as idle: {}", err);
                return ActiveRun::None;
            }
        };

        let ttl_ms = i64::try_from(self.settings.run_ttl.as_millis()).unwrap_or(i64::MAX);
        if state.is_stale((self.clock)(), ttl_ms) {
            engine_info!("discarding stale run for {:?}", state.query);
            if let Err(err) = self.runs.clear() {
                engine_warn!("failed to clear stale run: {}", err);
            }
            return ActiveRun::Expired;
        }
        ActiveRun::Live(state)
    }

    fn execute(&self, state: RunState, effects: Vec<Effect>) -> ResumeOutcome {
        let mut outcome = ResumeOutcome::Idle;
        for effect in effects {
            match effect {
                Effect::PersistRun => {
                    if let Err(err) = self.runs.save(&state) {
                        engine_error!("failed to persist run, staying put: {}", err);
                        return ResumeOutcome::Idle;
                    }
                }
                Effect::ClearRun => {
                    if let Err(err) = self.runs.clear() {
                        engine_warn!("failed to clear run state: {}", err);
                    }
                }
                Effect::Navigate { navigable_ref } => {
                    engine_info!("navigating to {}", navigable_ref);
                    self.navigator.navigate_to(&navigable_ref);
                    outcome = ResumeOutcome::Navigated(navigable_ref);
                }
                Effect::ExposeBranches(branches) => {
                    engine_info!("waiting for a choice among {} branches", branches.len());
                    outcome = ResumeOutcome::AwaitingSelection(branches);
                }
                Effect::RecordMatch {
                    query,
                    candidate_id,
                } => {
                    if let Err(err) = self.cache.record(&query, &candidate_id, (self.clock)()) {
                        engine_warn!("failed to cache match for {:?}: {}", query, err);
                    }
                }
                Effect::Highlight { candidate, label } => {
                    engine_info!("found: {}", label);
                    self.highlighter.highlight(&candidate.anchor, &label);
                    outcome = ResumeOutcome::Found { candidate, label };
                }
                Effect::RecordOutcome(run_outcome) => {
                    let record = LastOutcome {
                        recorded_at: (self.clock)(),
                        found: run_outcome.found,
                        label: run_outcome.label,
                    };
                    if let Err(err) = self.runs.record_outcome(&record) {
                        engine_warn!("failed to record outcome: {}", err);
                    }
                    if !record.found {
                        engine_info!("search for {:?} found nothing", state.query);
                        outcome = ResumeOutcome::NotFound;
                    }
                }
            }
        }
        outcome
    }
}
