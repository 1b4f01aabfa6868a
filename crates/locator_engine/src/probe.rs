use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use engine_logging::{engine_debug, engine_trace};
use locator_core::{normalize_query, Candidate};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::fetch::{FetchSettings, RequestProfile, ReqwestFetcher};
use crate::fields::FieldExtractor;
use crate::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    Match,
    NoMatch,
    /// No value could be read; callers treat this like `NoMatch`.
    Inconclusive,
}

/// How an observed value is compared with the target query. Both sides are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchPolicy {
    #[default]
    Exact,
    Substring,
}

impl MatchPolicy {
    pub fn matches(self, observed: &str, target: &str) -> bool {
        let observed = normalize_query(observed);
        let target = normalize_query(target);
        if target.is_empty() {
            return false;
        }
        match self {
            MatchPolicy::Exact => observed == target,
            MatchPolicy::Substring => observed.contains(&target),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub fast_timeout: Duration,
    pub thorough_timeout: Duration,
    /// Upper bound on thorough reads per candidate. Backends whose pages cannot
    /// change between reads may answer repeats without new requests.
    pub poll_attempts: u32,
    pub poll_delay: Duration,
    /// Try the lightweight read before the thorough one.
    pub fast_first: bool,
    /// Fall back to the thorough read when the fast one is inconclusive.
    pub thorough_fallback: bool,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            fast_timeout: Duration::from_millis(3_500),
            thorough_timeout: Duration::from_millis(7_500),
            poll_attempts: 14,
            poll_delay: Duration::from_millis(170),
            fast_first: true,
            thorough_fallback: true,
        }
    }
}

/// The two ways of reading a candidate's value.
///
/// `Ok(None)` means the read worked but carried no value yet.
#[async_trait::async_trait]
pub trait CandidateProber: Send + Sync {
    async fn probe_fast(&self, navigable_ref: &str) -> Result<Option<String>, FetchError>;
    async fn probe_thorough(&self, navigable_ref: &str) -> Result<Option<String>, FetchError>;
}

/// Reads candidate pages over HTTP: a background request parsed strictly, then
/// full page loads parsed leniently.
///
/// A full page that loads with a body but no value is fetched once; further
/// thorough reads of it answer `Ok(None)` without a request. Only an empty
/// body is fetched again.
pub struct HttpProber {
    fetcher: ReqwestFetcher,
    strict: FieldExtractor,
    lenient: FieldExtractor,
    settled: Mutex<HashSet<String>>,
}

impl HttpProber {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        Ok(Self::with_fetcher(ReqwestFetcher::new(settings)?))
    }

    pub fn with_fetcher(fetcher: ReqwestFetcher) -> Self {
        Self {
            fetcher,
            strict: FieldExtractor::strict(),
            lenient: FieldExtractor::lenient(),
            settled: Mutex::new(HashSet::new()),
        }
    }

    fn is_settled(&self, navigable_ref: &str) -> bool {
        self.settled
            .lock()
            .map(|settled| settled.contains(navigable_ref))
            .unwrap_or(false)
    }

    fn settle(&self, navigable_ref: &str) {
        if let Ok(mut settled) = self.settled.lock() {
            settled.insert(navigable_ref.to_string());
        }
    }
}

#[async_trait::async_trait]
impl CandidateProber for HttpProber {
    async fn probe_fast(&self, navigable_ref: &str) -> Result<Option<String>, FetchError> {
        let html = self
            .fetcher
            .fetch_text(navigable_ref, RequestProfile::Background)
            .await?;
        Ok(self.strict.extract(&html))
    }

    async fn probe_thorough(&self, navigable_ref: &str) -> Result<Option<String>, FetchError> {
        if self.is_settled(navigable_ref) {
            return Ok(None);
        }
        let html = self
            .fetcher
            .fetch_text(navigable_ref, RequestProfile::Page)
            .await?;
        let value = self.lenient.extract(&html);
        if value.is_none() && !html.trim().is_empty() {
            engine_trace!("{} loaded without a value; not fetching it again", navigable_ref);
            self.settle(navigable_ref);
        }
        Ok(value)
    }
}

/// Decides one candidate: fast read first, then bounded polling of the thorough read.
///
/// Every await point races the cancellation token; a cancelled probe reports
/// `Inconclusive` and drops its in-flight request.
pub struct TwoTierProber {
    backend: Arc<dyn CandidateProber>,
    settings: ProbeSettings,
    policy: MatchPolicy,
}

impl TwoTierProber {
    pub fn new(backend: Arc<dyn CandidateProber>, settings: ProbeSettings, policy: MatchPolicy) -> Self {
        Self {
            backend,
            settings,
            policy,
        }
    }

    pub async fn probe(
        &self,
        candidate: &Candidate,
        target: &str,
        cancel: &CancellationToken,
    ) -> ProbeVerdict {
        if self.settings.fast_first {
            match self.fast(candidate, cancel).await {
                Some(observed) => return self.judge(&observed, target),
                None if cancel.is_cancelled() => return ProbeVerdict::Inconclusive,
                None => {}
            }
            if !self.settings.thorough_fallback {
                return ProbeVerdict::Inconclusive;
            }
            engine_debug!("candidate {} inconclusive on fast read, polling", candidate.id);
        }
        self.thorough(candidate, target, cancel).await
    }

    async fn fast(&self, candidate: &Candidate, cancel: &CancellationToken) -> Option<String> {
        let read = tokio::time::timeout(
            self.settings.fast_timeout,
            self.backend.probe_fast(&candidate.navigable_ref),
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = read => match result {
                Ok(Ok(observed)) => observed.filter(|value| !value.trim().is_empty()),
                Ok(Err(err)) => {
                    engine_trace!("fast read of {} failed: {}", candidate.id, err);
                    None
                }
                Err(_) => {
                    engine_trace!("fast read of {} timed out", candidate.id);
                    None
                }
            },
        }
    }

    async fn thorough(
        &self,
        candidate: &Candidate,
        target: &str,
        cancel: &CancellationToken,
    ) -> ProbeVerdict {
        let polling = async {
            for attempt in 0..self.settings.poll_attempts {
                if cancel.is_cancelled() {
                    return ProbeVerdict::Inconclusive;
                }
                match self.backend.probe_thorough(&candidate.navigable_ref).await {
                    Ok(Some(observed)) if !observed.trim().is_empty() => {
                        return self.judge(&observed, target);
                    }
                    Ok(_) => {}
                    Err(err) => {
                        engine_trace!(
                            "thorough read {} of {} failed: {}",
                            attempt + 1,
                            candidate.id,
                            err
                        );
                        return ProbeVerdict::Inconclusive;
                    }
                }
                if cancel.is_cancelled() {
                    return ProbeVerdict::Inconclusive;
                }
                tokio::time::sleep(self.settings.poll_delay).await;
            }
            ProbeVerdict::Inconclusive
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => ProbeVerdict::Inconclusive,
            result = tokio::time::timeout(self.settings.thorough_timeout, polling) => {
                result.unwrap_or(ProbeVerdict::Inconclusive)
            }
        }
    }

    fn judge(&self, observed: &str, target: &str) -> ProbeVerdict {
        if self.policy.matches(observed, target) {
            ProbeVerdict::Match
        } else {
            ProbeVerdict::NoMatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MatchPolicy;

    #[test]
    fn exact_policy_ignores_case_and_spacing() {
        assert!(MatchPolicy::Exact.matches("  Alice ", "alice"));
        assert!(!MatchPolicy::Exact.matches("alice2", "alice"));
    }

    #[test]
    fn substring_policy_accepts_contained_target() {
        assert!(MatchPolicy::Substring.matches("alice.cohen", "ALICE"));
        assert!(!MatchPolicy::Substring.matches("bob", "alice"));
    }

    #[test]
    fn empty_target_never_matches() {
        assert!(!MatchPolicy::Substring.matches("anything", "   "));
    }
}
