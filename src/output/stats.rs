//! Build pass statistics
//!
//! Summarises what one build pass crawled, classified and compiled.

use crate::build::BuildOutput;

/// Build pass statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStatistics {
    /// Total number of manifest entries
    pub manifest_entries: usize,

    /// Entries fingerprinted by their child list
    pub stable_aggregates: usize,

    /// Resources read from the site root
    pub read: usize,

    /// Resources fetched over the network
    pub fetched: usize,

    /// Entries copied from the previous manifest
    pub reused: usize,

    pub parse_failures: usize,

    // Classification buckets
    pub deleted: usize,
    pub changed: usize,
    pub manually_refreshed: usize,
    pub stability_changed: usize,
    pub forced: bool,

    /// Rules in the newest journal entry
    pub rules_emitted: usize,

    pub journal_entries: usize,

    /// Size of the compact journal encoding in bytes
    pub journal_bytes: usize,

    pub epoch: u64,
}

impl BuildStatistics {
    /// Collects statistics from a finished build pass
    pub fn collect(output: &BuildOutput) -> Self {
        let analysis = &output.analysis;

        Self {
            manifest_entries: output.manifest.len(),
            stable_aggregates: output
                .manifest
                .entries
                .values()
                .filter(|fingerprint| fingerprint.is_children())
                .count(),
            read: output.report.read,
            fetched: output.report.fetched,
            reused: output.report.reused,
            parse_failures: output.report.parse_failures.len(),
            deleted: analysis.deleted.len(),
            changed: analysis.changed.len(),
            manually_refreshed: analysis.manually_refreshed.len(),
            stability_changed: analysis.stability_rule_added.len()
                + analysis.stability_rule_removed.len(),
            forced: analysis.force,
            rules_emitted: output
                .journal
                .entries
                .first()
                .map_or(0, |entry| entry.rules().len()),
            journal_entries: output.journal.entries.len(),
            journal_bytes: output.journal.encoded_len(),
            epoch: output.journal.epoch,
        }
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &BuildStatistics) {
    println!("=== Build Statistics ===\n");

    println!("Manifest:");
    println!("  Entries: {}", stats.manifest_entries);
    println!("  Stable aggregates: {}", stats.stable_aggregates);
    println!(
        "  Read locally: {}, fetched: {}, reused: {}",
        stats.read, stats.fetched, stats.reused
    );
    if stats.parse_failures > 0 {
        println!("  Parse failures: {}", stats.parse_failures);
    }
    println!();

    println!("Changes:");
    if stats.forced {
        println!("  Total invalidation (forced)");
    } else {
        println!("  Deleted: {}", stats.deleted);
        println!("  Changed: {}", stats.changed);
        println!("  Manually refreshed: {}", stats.manually_refreshed);
        println!("  Stability changed: {}", stats.stability_changed);
    }
    println!();

    println!("Journal:");
    println!("  Epoch: {}", stats.epoch);
    println!("  Entries: {}", stats.journal_entries);
    println!("  Rules in newest entry: {}", stats.rules_emitted);
    println!("  Encoded size: {} bytes", stats.journal_bytes);
}
