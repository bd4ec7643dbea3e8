//! Diff classifier comparing two manifest snapshots
//!
//! The classifier is a pure, synchronous pass over already-built manifests.
//! Its result feeds the update-plan compiler.

use crate::manifest::{Fingerprint, Manifest};
use std::collections::BTreeSet;

/// Classification buckets produced by comparing two manifests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzerResult {
    /// URLs known to the old manifest but absent from the new one
    pub deleted: BTreeSet<String>,

    /// URLs whose content hash differs
    pub changed: BTreeSet<String>,

    /// URLs requested for refresh by the operator
    pub manually_refreshed: BTreeSet<String>,

    /// URLs whose fingerprint turned from a hash into a child list
    pub stability_rule_added: BTreeSet<String>,

    /// URLs whose fingerprint turned from a child list into a hash
    pub stability_rule_removed: BTreeSet<String>,

    /// Total invalidation; when set every other bucket is meaningless
    pub force: bool,
}

impl AnalyzerResult {
    /// A result that invalidates everything
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    /// Union of every bucket: the URLs a client must drop
    pub fn invalidated(&self) -> BTreeSet<String> {
        self.deleted
            .iter()
            .chain(&self.changed)
            .chain(&self.manually_refreshed)
            .chain(&self.stability_rule_added)
            .chain(&self.stability_rule_removed)
            .cloned()
            .collect()
    }

    /// Returns true if nothing needs to be invalidated
    pub fn is_empty(&self) -> bool {
        !self.force
            && self.deleted.is_empty()
            && self.changed.is_empty()
            && self.manually_refreshed.is_empty()
            && self.stability_rule_added.is_empty()
            && self.stability_rule_removed.is_empty()
    }
}

/// Compares an old manifest against a new one
///
/// # Classification Rules
///
/// Applied in priority order to every URL of the old manifest:
///
/// | Condition | Result |
/// |-----------|--------|
/// | Schema versions differ | `force`, everything else ignored |
/// | URL in `manual_refresh` | `manually_refreshed` (consumed from the set) |
/// | URL missing from `new` | `deleted` |
/// | Hash became a list | `stability_rule_added` |
/// | List became a hash | `stability_rule_removed` |
/// | Both hashes, different | `changed` |
///
/// Refresh URLs the old manifest never knew are still reported as
/// `manually_refreshed`. The refresh set is taken by value: it is single-use.
///
/// # Example
///
/// ```
/// use std::collections::BTreeSet;
/// use sumi_swell::diff::classify;
/// use sumi_swell::manifest::{Fingerprint, Manifest};
///
/// let mut old = Manifest::new(3);
/// old.entries.insert("/a.js".into(), Fingerprint::Hash("h1".into()));
/// let mut new = Manifest::new(3);
/// new.entries.insert("/a.js".into(), Fingerprint::Hash("h2".into()));
///
/// let result = classify(Some(&old), &new, BTreeSet::new());
/// assert!(result.changed.contains("/a.js"));
/// ```
pub fn classify(
    old: Option<&Manifest>,
    new: &Manifest,
    mut manual_refresh: BTreeSet<String>,
) -> AnalyzerResult {
    let mut result = AnalyzerResult::default();

    if let Some(old) = old {
        if old.schema_version != new.schema_version {
            tracing::info!(
                "Schema version changed ({} -> {}), forcing total invalidation",
                old.schema_version,
                new.schema_version
            );
            return AnalyzerResult::forced();
        }

        for (url, old_fingerprint) in &old.entries {
            if manual_refresh.remove(url) {
                result.manually_refreshed.insert(url.clone());
                continue;
            }

            let Some(new_fingerprint) = new.get(url) else {
                result.deleted.insert(url.clone());
                continue;
            };

            match (old_fingerprint, new_fingerprint) {
                (Fingerprint::Hash(_), Fingerprint::Children(_)) => {
                    result.stability_rule_added.insert(url.clone());
                }
                (Fingerprint::Children(_), Fingerprint::Hash(_)) => {
                    result.stability_rule_removed.insert(url.clone());
                }
                (Fingerprint::Hash(before), Fingerprint::Hash(after)) if before != after => {
                    result.changed.insert(url.clone());
                }
                _ => {}
            }
        }
    }

    result.manually_refreshed.append(&mut manual_refresh);

    tracing::debug!(
        "Classified: {} deleted, {} changed, {} refreshed, {} stability added, {} stability removed",
        result.deleted.len(),
        result.changed.len(),
        result.manually_refreshed.len(),
        result.stability_rule_added.len(),
        result.stability_rule_removed.len()
    );

    result
}
