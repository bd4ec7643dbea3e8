//! Configuration module for Sumi-Swell
//!
//! This module handles loading, layering, and validating TOML configuration.
//! Every source of settings (config files, command-line overrides) becomes a
//! [`ConfigLayer`]; [`Config::from_layers`] merges them over the defaults into
//! one immutable, validated [`Config`].
//!
//! # Example
//!
//! ```no_run
//! use sumi_swell::config::load_config;
//! use std::path::PathBuf;
//!
//! let config = load_config(&[PathBuf::from("swell.toml")]).unwrap();
//! println!("Fetching with concurrency {}", config.fetcher.concurrency);
//! ```

mod layers;
mod parser;
mod types;
mod validation;

// Re-export types
pub use layers::{ConfigLayer, FetcherLayer, PlanLayer, RulesLayer, SiteLayer};
pub use types::{
    Config, FetcherConfig, MirrorConfig, PlanConfig, RewriteRule, RulesConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_layer, load_layers};
