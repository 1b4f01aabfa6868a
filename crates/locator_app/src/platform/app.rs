use std::sync::Arc;

use anyhow::Context;
use chrono::DateTime;
use engine_logging::{engine_debug, engine_warn};
use locator_core::{RunMode, Timestamp};
use locator_engine::{
    anchored_row_text, ensure_state_dir, Collaborators, DurableStore, FileStore, HttpProber,
    Navigator, Orchestrator, PageContext, ReqwestFetcher, ResumeOutcome, StatusReport,
};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use super::config::AppConfig;
use super::surface::{load_location, ConsoleHighlighter, FetchedPage, PendingNavigator, LOCATION_KEY};
use crate::Command;

/// Upper bound on contexts opened by one command.
const MAX_HOPS: usize = 64;

pub fn run(command: Command, config: AppConfig) -> anyhow::Result<()> {
    ensure_state_dir(&config.state_dir)
        .with_context(|| format!("preparing state directory {}", config.state_dir.display()))?;
    let store: Arc<dyn DurableStore> = Arc::new(FileStore::new(config.state_dir.clone()));
    let fetcher = ReqwestFetcher::new(config.settings.fetch.clone())?;

    let app = App {
        store: store.clone(),
        navigator: Arc::new(PendingNavigator::new(store)),
        highlighter: Arc::new(ConsoleHighlighter::default()),
        prober: Arc::new(HttpProber::with_fetcher(fetcher.clone())),
        fetcher,
        config,
    };

    match command {
        Command::Start { query, all } => {
            let mode = if all { RunMode::ScanAll } else { RunMode::Single };
            if app.orchestrator()?.start(&query, mode) == ResumeOutcome::Idle {
                println!("nothing to search for");
                return Ok(());
            }
            app.drive()
        }
        Command::Select { index } => {
            let outcome = app.orchestrator()?.select_branch(index);
            if outcome == ResumeOutcome::Idle {
                println!("no branch {index} is waiting to be chosen");
                return Ok(());
            }
            app.drive()
        }
        Command::Resume => {
            let Some(location) = load_location(app.store.as_ref())? else {
                println!("nothing to resume");
                return Ok(());
            };
            app.navigator.navigate_to(&location.navigable_ref);
            app.drive()
        }
        Command::Stop => {
            app.orchestrator()?.stop();
            app.forget_location();
            println!("search stopped");
            Ok(())
        }
        Command::Clear => {
            app.orchestrator()?.clear();
            app.forget_location();
            println!("search and last outcome cleared");
            Ok(())
        }
        Command::Status => {
            print_status(&app.orchestrator()?.status());
            Ok(())
        }
    }
}

struct App {
    store: Arc<dyn DurableStore>,
    navigator: Arc<PendingNavigator>,
    highlighter: Arc<ConsoleHighlighter>,
    prober: Arc<HttpProber>,
    fetcher: ReqwestFetcher,
    config: AppConfig,
}

impl App {
    /// A fresh orchestrator; nothing carries over from the previous one but the store.
    fn orchestrator(&self) -> anyhow::Result<Orchestrator> {
        let collaborators = Collaborators {
            store: self.store.clone(),
            prober: self.prober.clone(),
            navigator: self.navigator.clone(),
            highlighter: self.highlighter.clone(),
        };
        Ok(Orchestrator::new(self.config.settings.clone(), collaborators)?)
    }

    /// Opens every pending navigation as a new context until the search settles.
    fn drive(&self) -> anyhow::Result<()> {
        let runtime = Runtime::new().context("creating async runtime")?;
        let interrupted = CancellationToken::new();
        {
            let interrupted = interrupted.clone();
            runtime.spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    interrupted.cancel();
                }
            });
        }

        for hop in 0..MAX_HOPS {
            let Some(target) = self.navigator.take_pending() else {
                return Ok(());
            };
            engine_debug!("context {} at {}", hop + 1, target);

            let orchestrator = self.orchestrator()?;
            let stop = orchestrator.stop_token();
            let page = FetchedPage::new(&self.fetcher, &target);
            let context = PageContext::new(&target, &page);
            let outcome = runtime.block_on(async {
                tokio::select! {
                    outcome = orchestrator.resume(&context) => outcome,
                    _ = interrupted.cancelled() => {
                        stop.cancel();
                        ResumeOutcome::Idle
                    }
                }
            });

            if interrupted.is_cancelled() {
                orchestrator.stop();
                self.forget_location();
                println!("search stopped");
                return Ok(());
            }
            self.report(&outcome, page.body().as_deref());
        }

        engine_warn!("stopped after {} contexts; run `locator resume` to continue", MAX_HOPS);
        Ok(())
    }

    fn report(&self, outcome: &ResumeOutcome, body: Option<&str>) {
        match outcome {
            ResumeOutcome::Idle | ResumeOutcome::Unrelated | ResumeOutcome::Navigated(_) => {}
            ResumeOutcome::Discarded => println!("the previous search expired and was dropped"),
            ResumeOutcome::AwaitingSelection(branches) => {
                println!("several matches; choose one with `locator select <index>`:");
                for (index, branch) in branches.iter().enumerate() {
                    println!("  [{index}] {}", branch.label);
                }
            }
            ResumeOutcome::Found { candidate, label } => {
                println!("found: {label}");
                let row = self
                    .highlighter
                    .take_marked()
                    .and_then(|(anchor, _)| body.and_then(|html| anchored_row_text(html, &anchor)));
                if let Some(row) = row {
                    println!("  row: {row}");
                }
                println!("  open: {}", candidate.navigable_ref);
            }
            ResumeOutcome::NotFound => println!("not found"),
        }
    }

    fn forget_location(&self) {
        if let Err(err) = self.store.delete(LOCATION_KEY) {
            engine_warn!("failed to forget location: {}", err);
        }
    }
}

fn print_status(status: &StatusReport) {
    match &status.run {
        Some(run) => {
            println!("active search: {:?} ({:?}, {:?})", run.query, run.mode, run.status);
            println!("  started: {}", format_time(run.started_at));
            if let Some(branch) = &run.current_branch {
                println!("  branch: {branch}");
            }
            if run.queued > 0 {
                println!("  queued branches: {}", run.queued);
            }
            for (index, label) in run.offered.iter().enumerate() {
                println!("  [{index}] {label}");
            }
        }
        None => println!("no active search"),
    }
    match &status.last_outcome {
        Some(last) if last.found => {
            println!("last outcome: found {} at {}", last.label, format_time(last.recorded_at))
        }
        Some(last) => println!("last outcome: not found at {}", format_time(last.recorded_at)),
        None => println!("last outcome: none"),
    }
    println!("cached matches: {}", status.cached_queries);
}

fn format_time(ms: Timestamp) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}
