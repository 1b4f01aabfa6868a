use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use engine_logging::engine_info;
use locator_core::SiteLayout;
use locator_engine::{LocatorSettings, MatchPolicy};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG: &str = "./locator.ron";
const DEFAULT_STATE_DIR: &str = "./.locator";

/// On-disk settings. Every field is optional; missing ones keep their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub state_dir: Option<PathBuf>,
    pub base_url: Option<String>,
    /// Sent with every request; the session is established outside the locator.
    pub cookie: Option<String>,
    pub concurrency: Option<usize>,
    pub run_ttl_minutes: Option<u64>,
    pub match_policy: Option<MatchPolicy>,
    pub fast_timeout_ms: Option<u64>,
    pub thorough_timeout_ms: Option<u64>,
    pub poll_attempts: Option<u32>,
    pub poll_delay_ms: Option<u64>,
    pub fast_first: Option<bool>,
    pub thorough_fallback: Option<bool>,
    pub request_timeout_ms: Option<u64>,
    pub layout: Option<SiteLayout>,
}

/// Command-line values, which win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub state_dir: Option<PathBuf>,
    pub base_url: Option<String>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub state_dir: PathBuf,
    pub settings: LocatorSettings,
}

/// Reads `path`, or `./locator.ron` when it exists, and applies `overrides`.
pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<AppConfig> {
    let file = match path {
        Some(path) => read(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => read(Path::new(DEFAULT_CONFIG))?,
        None => ConfigFile::default(),
    };
    Ok(resolve(file, overrides))
}

fn read(path: &Path) -> anyhow::Result<ConfigFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let file = ron::from_str(&text)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    engine_info!("loaded settings from {}", path.display());
    Ok(file)
}

pub fn resolve(file: ConfigFile, overrides: Overrides) -> AppConfig {
    let mut settings = LocatorSettings::default();
    if let Some(layout) = file.layout {
        settings.layout = layout;
    }
    if let Some(origin) = overrides.base_url.or(file.base_url) {
        settings.layout.origin = origin.trim_end_matches('/').to_string();
    }
    if let Some(concurrency) = overrides.concurrency.or(file.concurrency) {
        settings.concurrency = concurrency.max(1);
    }
    if let Some(minutes) = file.run_ttl_minutes {
        settings.run_ttl = Duration::from_secs(minutes.saturating_mul(60));
    }
    if let Some(policy) = file.match_policy {
        settings.match_policy = policy;
    }

    let probe = &mut settings.probe;
    if let Some(ms) = file.fast_timeout_ms {
        probe.fast_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = file.thorough_timeout_ms {
        probe.thorough_timeout = Duration::from_millis(ms);
    }
    if let Some(attempts) = file.poll_attempts {
        probe.poll_attempts = attempts;
    }
    if let Some(ms) = file.poll_delay_ms {
        probe.poll_delay = Duration::from_millis(ms);
    }
    if let Some(fast_first) = file.fast_first {
        probe.fast_first = fast_first;
    }
    if let Some(fallback) = file.thorough_fallback {
        probe.thorough_fallback = fallback;
    }

    if let Some(ms) = file.request_timeout_ms {
        settings.fetch.request_timeout = Duration::from_millis(ms);
    }
    settings.fetch.cookie = file.cookie;

    AppConfig {
        state_dir: overrides
            .state_dir
            .or(file.state_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
        settings,
    }
}
