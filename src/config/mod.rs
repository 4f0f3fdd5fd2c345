//! Configuration module for Catalog Harvester
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file, and merging command-line overrides on top of it.
//!
//! # Example
//!
//! ```no_run
//! use catalog_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Checkpoint every {} items", config.run.checkpoint_every);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, RunConfig, RunOverrides, SourceConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
