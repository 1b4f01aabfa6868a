use std::time::Duration;

use locator_core::SiteLayout;

use crate::fetch::FetchSettings;
use crate::probe::{MatchPolicy, ProbeSettings};

#[derive(Debug, Clone)]
pub struct LocatorSettings {
    pub layout: SiteLayout,
    pub fetch: FetchSettings,
    pub probe: ProbeSettings,
    pub match_policy: MatchPolicy,
    /// Upper bound on probes in flight during one leaf scan.
    pub concurrency: usize,
    /// Runs older than this are discarded on resume.
    pub run_ttl: Duration,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            layout: SiteLayout::default(),
            fetch: FetchSettings::default(),
            probe: ProbeSettings::default(),
            match_policy: MatchPolicy::default(),
            concurrency: 10,
            run_ttl: Duration::from_secs(30 * 60),
        }
    }
}
