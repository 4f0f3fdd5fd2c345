//! Crawler coordinator - main crawl orchestration logic
//!
//! This module ties the walker, fetcher, parser, and checkpoint store into
//! one resumable run:
//! - Reconciling the checkpoint store with any existing dataset
//! - Skipping detail URLs that are already stored
//! - Fetching and parsing new items, assigning ids in walk order
//! - Flushing in periodic checkpoints
//! - Honoring the item limit and external stop requests

use crate::config::{Config, RunConfig};
use crate::crawler::fetcher::{PageSource, RateLimitedFetcher};
use crate::crawler::parser::parse_item_detail;
use crate::crawler::walker::{CategoryWalker, DetailLink};
use crate::output::RunSummary;
use crate::state::{RunState, StopHandle};
use crate::storage::{CheckpointStore, ItemDetails};
use crate::HarvestError;
use chrono::Utc;
use std::time::Instant;
use url::Url;

/// Why the consume loop ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Exhausted,
    LimitReached,
    Stopped,
}

/// Per-category progress, logged when the walk leaves the category
struct CategoryProgress {
    name: String,
    started: Instant,
    collected_before: usize,
}

/// Main crawler coordinator structure
///
/// Owns the page source and, for the duration of `run`, the checkpoint
/// store with its key set and id counter. One coordinator performs one run.
pub struct Coordinator<S: PageSource> {
    config: RunConfig,
    index_url: Url,
    source: S,
    stop: StopHandle,
    state: RunState,
}

impl Coordinator<RateLimitedFetcher> {
    /// Creates a coordinator that fetches over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The full, validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - Bad base URL or HTTP client construction failed
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let index_url = Url::parse(&config.source.base_url)?;
        let fetcher = RateLimitedFetcher::from_config(config)?;
        Ok(Self::new(config.run.clone(), index_url, fetcher))
    }
}

impl<S: PageSource> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - Settings for this run
    /// * `index_url` - Page carrying the category index
    /// * `source` - Where pages come from
    pub fn new(config: RunConfig, index_url: Url, source: S) -> Self {
        Self {
            config,
            index_url,
            source,
            stop: StopHandle::new(),
            state: RunState::Init,
        }
    }

    /// Replaces the stop handle, e.g. with one already wired to a signal
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// A handle that stops the run at the next item boundary
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs the crawl to completion, the item limit, or a stop request
    ///
    /// A stop request ends in `Aborted` but still returns the summary; only
    /// start-up failures, an unreadable category index, and write failures
    /// are returned as errors. In every case a best-effort flush runs
    /// before the coordinator leaves `Running`.
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        if self.state != RunState::Init {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: RunState::Running,
            });
        }

        let mut summary = RunSummary::new(Utc::now());
        let started = Instant::now();

        let mut store =
            match CheckpointStore::open(&self.config.output_path, self.config.resume) {
                Ok(store) => store,
                Err(e) => {
                    tracing::error!("Cannot open checkpoint store: {}", e);
                    self.transition(RunState::Aborted)?;
                    return Err(e.into());
                }
            };

        self.transition(RunState::Running)?;
        tracing::info!(
            "Run started: output {}, {} existing records, next id {}",
            store.path().display(),
            store.len(),
            store.next_id()
        );

        let result = self.consume(&mut store, &mut summary, started).await;

        let outcome = match result {
            Ok(outcome @ (Outcome::Exhausted | Outcome::LimitReached)) => {
                match store.flush() {
                    Ok(rows) => {
                        summary.final_flush_rows = rows;
                        self.transition(RunState::Completed)?;
                        Ok(outcome)
                    }
                    Err(e) => {
                        tracing::error!("Final flush failed: {}", e);
                        self.transition(RunState::Aborted)?;
                        Err(e.into())
                    }
                }
            }
            Ok(Outcome::Stopped) => {
                tracing::warn!("Stop requested, saving progress");
                summary.final_flush_rows = self.best_effort_flush(&mut store);
                self.transition(RunState::Aborted)?;
                Ok(Outcome::Stopped)
            }
            Err(e) => {
                tracing::error!("Run aborted: {}", e);
                summary.final_flush_rows = self.best_effort_flush(&mut store);
                self.transition(RunState::Aborted)?;
                Err(e)
            }
        };

        summary.limit_reached = matches!(outcome, Ok(Outcome::LimitReached));
        summary.total_rows = store.persisted_len();
        summary.finish(self.state, Utc::now(), started.elapsed());

        tracing::info!(
            "Run {}: saved {} records to {} (collected={}, skipped={}, failed={}, time={:.2}s)",
            summary.state,
            summary.total_rows,
            store.path().display(),
            summary.collected,
            summary.skipped_existing,
            summary.failed,
            summary.elapsed.as_secs_f64()
        );

        outcome.map(|_| summary)
    }

    /// The RUNNING phase: pulls detail URLs until exhausted, limited, or stopped
    async fn consume(
        &mut self,
        store: &mut CheckpointStore,
        summary: &mut RunSummary,
        started: Instant,
    ) -> Result<Outcome, HarvestError> {
        let mut walker = CategoryWalker::start(&mut self.source, &self.index_url).await?;
        summary.categories = walker.categories().len();

        let mut category: Option<CategoryProgress> = None;
        let outcome = loop {
            if self.stop.is_stopped() {
                break Outcome::Stopped;
            }

            let Some(link) = walker.next(&mut self.source).await else {
                break Outcome::Exhausted;
            };
            summary.discovered += 1;

            if category.as_ref().map(|c| c.name.as_str()) != Some(link.category.as_str()) {
                if let Some(previous) = category.take() {
                    log_category(&previous, summary.collected);
                }
                category = Some(CategoryProgress {
                    name: link.category.clone(),
                    started: Instant::now(),
                    collected_before: summary.collected,
                });
            }

            if store.contains(&link.detail_url) {
                tracing::debug!("Already collected, skipping {}", link.detail_url);
                summary.skipped_existing += 1;
                continue;
            }

            if store.pending_len() >= self.config.checkpoint_every {
                let rows = store.flush()?;
                summary.checkpoints += 1;
                tracing::info!(
                    "Checkpoint: saved {} rows ({} total) to {}",
                    rows,
                    store.persisted_len(),
                    store.path().display()
                );
            }

            match self.harvest(&link).await {
                Ok(details) => {
                    let title = details.title.clone();
                    if let Some(id) = store.append(details) {
                        summary.collected += 1;
                        self.report_item(id, &title, summary.collected, started);
                    }
                }
                Err(HarvestError::Parse(e)) => {
                    summary.failed += 1;
                    tracing::warn!(
                        "Skipping {}: field `{}` could not be parsed: {}",
                        link.detail_url,
                        e.field(),
                        e
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!("Skipping {}: {}", link.detail_url, e);
                }
            }

            if let Some(limit) = self.config.limit {
                if summary.collected >= limit {
                    tracing::info!("Limit of {} new items reached", limit);
                    break Outcome::LimitReached;
                }
            }
        };

        if let Some(last) = category {
            log_category(&last, summary.collected);
        }

        let walk = walker.stats();
        summary.listing_pages = walk.listing_pages;
        summary.categories_cut_short = walk.categories_cut_short;

        Ok(outcome)
    }

    /// Fetches and parses one detail page
    async fn harvest(&mut self, link: &DetailLink) -> Result<ItemDetails, HarvestError> {
        let url = Url::parse(&link.detail_url)?;
        let body = self.source.fetch(url.as_str()).await?;
        Ok(parse_item_detail(&body, &url, &link.category)?)
    }

    fn report_item(&self, id: u64, title: &str, collected: usize, started: Instant) {
        if self.config.verbose {
            tracing::info!("[OK] #{} {}", id, title);
        } else {
            tracing::debug!("[OK] #{} {}", id, title);
        }

        if collected % 20 == 0 {
            let rate = collected as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!("Progress: {} items collected, {:.2} items/sec", collected, rate);
        }
    }

    fn best_effort_flush(&self, store: &mut CheckpointStore) -> usize {
        match store.flush() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(
                    "Best-effort flush failed, {} buffered records lost: {}",
                    store.pending_len(),
                    e
                );
                0
            }
        }
    }

    fn transition(&mut self, next: RunState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Run state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

fn log_category(progress: &CategoryProgress, collected_now: usize) {
    tracing::info!(
        "Category {}: +{} items in {:.2}s",
        progress.name,
        collected_now - progress.collected_before,
        progress.started.elapsed().as_secs_f64()
    );
}
