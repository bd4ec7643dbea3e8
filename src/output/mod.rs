//! Output module for build artifacts and statistics
//!
//! This module handles:
//! - Writing the manifest and journal through an [`ArtifactSink`]
//! - Summarising a build pass as [`BuildStatistics`]

mod json_dir;
pub mod stats;
mod traits;

pub use json_dir::JsonDirSink;
pub use stats::{print_statistics, BuildStatistics};
pub use traits::{ArtifactSink, OutputError, OutputResult};
