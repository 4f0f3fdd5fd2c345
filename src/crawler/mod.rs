//! Crawler module for catalog page fetching and processing
//!
//! This module contains the ingestion pipeline, including:
//! - HTTP fetching with a fixed delay and retry backoff
//! - Parsing of category index, listing, and detail pages
//! - Walking categories and their paginated listings in stable order
//! - Overall run coordination with checkpoints and resume

mod coordinator;
mod fetcher;
mod parser;
#[cfg(test)]
mod testing;
mod walker;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, FetchError, FetchFailure, PageSource, RateLimitedFetcher};
pub use parser::{
    parse_category_index, parse_item_detail, parse_listing_page, Category, ListingPage, ParseError,
};
pub use walker::{CategoryWalker, DetailLink, WalkStats};

use crate::config::Config;
use crate::output::RunSummary;
use crate::state::StopHandle;
use crate::HarvestError;

/// Runs a complete harvest over HTTP
///
/// This is the main entry point for starting a run. It will:
/// 1. Build the HTTP client and rate-limited fetcher
/// 2. Open (and, when resuming, reconcile) the output dataset
/// 3. Walk every category and collect new items
/// 4. Flush periodically and once more at the end
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `stop` - Handle the caller can use to stop the run between items
///
/// # Returns
///
/// * `Ok(RunSummary)` - Run finished (completed, or aborted by `stop`)
/// * `Err(HarvestError)` - Run could not start or could not persist
pub async fn crawl(config: &Config, stop: StopHandle) -> Result<RunSummary, HarvestError> {
    let mut coordinator = Coordinator::from_config(config)?.with_stop_handle(stop);
    coordinator.run().await
}
