use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Catalog Harvester
///
/// Every key is optional in the TOML file; missing keys fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub source: SourceConfig,
}

/// Settings for one ingestion run
///
/// Immutable for the duration of a run once handed to the coordinator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    /// Path of the CSV dataset to create or extend
    pub output_path: PathBuf,

    /// Fixed pause before every HTTP request (seconds)
    pub delay_seconds: f64,

    /// Additional attempts after a failed request
    pub retries: u32,

    /// Emit per-item progress logs
    pub verbose: bool,

    /// Stop after this many newly collected items
    pub limit: Option<usize>,

    /// Flush buffered records every N new items
    pub checkpoint_every: usize,

    /// Extend an existing dataset instead of rebuilding it
    pub resume: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("data/books.csv"),
            delay_seconds: 0.25,
            retries: 4,
            verbose: false,
            limit: None,
            checkpoint_every: 100,
            resume: false,
        }
    }
}

impl RunConfig {
    /// The inter-request delay as a `Duration`
    ///
    /// Callers are expected to have validated the config first; negative
    /// and NaN values collapse to zero, values too large for a `Duration`
    /// saturate.
    pub fn delay(&self) -> Duration {
        if self.delay_seconds > 0.0 {
            Duration::try_from_secs_f64(self.delay_seconds).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

/// The catalog being harvested
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Catalog home page, which also carries the category index
    pub base_url: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Per-request timeout (seconds)
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://books.toscrape.com/".to_string(),
            user_agent: format!(
                "CatalogHarvester/{} (educational use; +https://books.toscrape.com/)",
                env!("CARGO_PKG_VERSION")
            ),
            timeout_seconds: 30,
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub output_path: Option<PathBuf>,
    pub delay_seconds: Option<f64>,
    pub retries: Option<u32>,
    pub verbose: bool,
    pub limit: Option<usize>,
    pub checkpoint_every: Option<usize>,
    pub resume: bool,
    pub base_url: Option<String>,
}

impl Config {
    /// Applies command-line overrides on top of file/default values
    ///
    /// Boolean flags can only switch a setting on.
    pub fn apply_overrides(&mut self, overrides: RunOverrides) {
        if let Some(path) = overrides.output_path {
            self.run.output_path = path;
        }
        if let Some(delay) = overrides.delay_seconds {
            self.run.delay_seconds = delay;
        }
        if let Some(retries) = overrides.retries {
            self.run.retries = retries;
        }
        if overrides.limit.is_some() {
            self.run.limit = overrides.limit;
        }
        if let Some(every) = overrides.checkpoint_every {
            self.run.checkpoint_every = every;
        }
        if let Some(base_url) = overrides.base_url {
            self.source.base_url = base_url;
        }
        self.run.verbose |= overrides.verbose;
        self.run.resume |= overrides.resume;
    }
}
