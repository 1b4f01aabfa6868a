use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info, engine_warn};
use locator_core::Candidate;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::probe::{ProbeVerdict, TwoTierProber};

/// How often scan progress is logged, in claimed candidates.
const PROGRESS_EVERY: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolOutcome {
    pub matched: Option<Candidate>,
    /// Candidates claimed by a worker before the pool stopped.
    pub probed: usize,
}

impl PoolOutcome {
    pub fn found(&self) -> bool {
        self.matched.is_some()
    }
}

/// Runs the prober over a candidate list with at most `concurrency` probes in flight.
pub struct ProbePool {
    prober: Arc<TwoTierProber>,
    concurrency: usize,
}

struct ScanShared {
    candidates: Vec<Candidate>,
    target: String,
    cursor: AtomicUsize,
    claimed: AtomicUsize,
    found: AtomicBool,
}

impl ProbePool {
    pub fn new(prober: Arc<TwoTierProber>, concurrency: usize) -> Self {
        Self {
            prober,
            concurrency: concurrency.max(1),
        }
    }

    /// Probes until a candidate matches or the list is exhausted.
    ///
    /// The first match cancels every other probe, in flight or not, and is the
    /// only result returned. Cancelling `stop` ends the scan without a match.
    pub async fn run(
        &self,
        candidates: Vec<Candidate>,
        target: &str,
        stop: &CancellationToken,
    ) -> PoolOutcome {
        if candidates.is_empty() {
            return PoolOutcome::default();
        }
        let workers = self.concurrency.min(candidates.len());
        let total = candidates.len();
        engine_info!("scanning {} candidates with {} workers", total, workers);

        let shared = Arc::new(ScanShared {
            candidates,
            target: target.to_string(),
            cursor: AtomicUsize::new(0),
            claimed: AtomicUsize::new(0),
            found: AtomicBool::new(false),
        });
        let cancel = stop.child_token();

        let mut tasks = JoinSet::new();
        for _ in 0..workers {
            tasks.spawn(scan_worker(
                shared.clone(),
                self.prober.clone(),
                cancel.clone(),
            ));
        }

        let mut matched = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(candidate)) => {
                    matched = Some(candidate);
                    break;
                }
                Ok(None) => {}
                Err(err) => engine_warn!("probe worker ended abnormally: {}", err),
            }
        }
        cancel.cancel();
        tasks.abort_all();
        // No probe may outlive the scan.
        while tasks.join_next().await.is_some() {}

        let probed = shared.claimed.load(Ordering::SeqCst).min(total);
        PoolOutcome { matched, probed }
    }
}

async fn scan_worker(
    shared: Arc<ScanShared>,
    prober: Arc<TwoTierProber>,
    cancel: CancellationToken,
) -> Option<Candidate> {
    let total = shared.candidates.len();
    loop {
        if cancel.is_cancelled() || shared.found.load(Ordering::SeqCst) {
            return None;
        }
        let index = shared.cursor.fetch_add(1, Ordering::SeqCst);
        let candidate = shared.candidates.get(index)?;

        let claimed = shared.claimed.fetch_add(1, Ordering::SeqCst) + 1;
        if claimed == 1 || claimed % PROGRESS_EVERY == 0 || claimed == total {
            engine_debug!("scan progress {}/{}", claimed, total);
        }

        let verdict = prober.probe(candidate, &shared.target, &cancel).await;
        if cancel.is_cancelled() {
            return None;
        }
        if verdict == ProbeVerdict::Match
            && shared
                .found
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            cancel.cancel();
            return Some(candidate.clone());
        }
    }
}
