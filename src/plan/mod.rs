//! Update-plan compiler
//!
//! Turns a set of invalidated URLs into the next [`Journal`]:
//!
//! 1. Merge collapsing into `prefix` rules
//! 2. The page-document flood guard (`html` rule)
//! 3. Minimal suffix mining over the remaining URLs
//! 4. Prepending the new entry and bumping the epoch
//! 5. Cross-entry redundancy elimination
//! 6. Byte-budget enforcement
//!
//! Everything here is synchronous and free of I/O.

mod budget;
mod redundancy;
mod trie;

pub use budget::{enforce_budget, BudgetOutcome};
pub use redundancy::eliminate_redundancy;
pub use trie::{mine_suffixes, MinedPatterns, SuffixTrie};

use crate::diff::AnalyzerResult;
use crate::journal::{Entry, Journal, Rule, RuleError};
use crate::manifest::Manifest;
use crate::url::{is_page_document, longest_prefix};
use std::collections::BTreeSet;
use thiserror::Error;

/// Default size bound for the encoded journal entries
pub const DEFAULT_BYTE_BUDGET: usize = 1024;

/// Errors raised while compiling a journal
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Invalid rule in journal entry {version}: {source}")]
    InvalidRule {
        version: u64,
        #[source]
        source: RuleError,
    },

    #[error("Journal {counter} cannot be incremented past {}", u64::MAX)]
    CounterExhausted { counter: &'static str },
}

/// Compiler knobs, taken from the `[plan]` configuration section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSettings {
    /// URL prefixes collapsed into a single `prefix` rule when anything below them changes
    pub merge_prefixes: Vec<String>,

    /// Page-document count above which one `html` rule replaces them; 0 disables
    pub html_threshold: usize,

    /// Upper bound for the encoded journal entries
    pub byte_budget: usize,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            merge_prefixes: Vec::new(),
            html_threshold: 0,
            byte_budget: DEFAULT_BYTE_BUDGET,
        }
    }
}

/// Every URL either manifest knows about
pub fn universe_of(old: Option<&Manifest>, new: &Manifest) -> BTreeSet<String> {
    old.into_iter()
        .flat_map(Manifest::urls)
        .chain(new.urls())
        .map(str::to_string)
        .collect()
}

/// Compiles the next journal for an ordinary (non-forced) update
///
/// # Arguments
///
/// * `universe` - Every URL known to the old or new manifest
/// * `invalidated` - URLs the client must drop
/// * `settings` - Merge prefixes, flood threshold and byte budget
/// * `prior` - The previously published journal; not modified
///
/// # Returns
///
/// The new journal, or an error if the prior journal carries a rule that
/// cannot be compiled or its version or epoch is already `u64::MAX`
pub fn compile(
    universe: &BTreeSet<String>,
    invalidated: &BTreeSet<String>,
    settings: &PlanSettings,
    prior: &Journal,
) -> Result<Journal, PlanError> {
    let mut rules = Vec::new();
    let mut remaining = BTreeSet::new();
    let mut touched_prefixes = BTreeSet::new();

    for url in invalidated {
        match longest_prefix(&settings.merge_prefixes, url) {
            Some(prefix) => {
                touched_prefixes.insert(prefix.to_string());
            }
            None => {
                remaining.insert(url.clone());
            }
        }
    }

    let mut mining_universe: BTreeSet<String> = universe
        .iter()
        .filter(|url| !touched_prefixes.iter().any(|p| url.starts_with(p.as_str())))
        .cloned()
        .collect();
    rules.extend(touched_prefixes.iter().map(Rule::prefix));

    let pages = remaining.iter().filter(|url| is_page_document(url)).count();
    if settings.html_threshold > 0 && pages > settings.html_threshold {
        tracing::info!(
            "{} page documents changed (threshold {}), invalidating all pages",
            pages,
            settings.html_threshold
        );
        remaining.retain(|url| !is_page_document(url));
        mining_universe.retain(|url| !is_page_document(url));
        rules.push(Rule::html());
    }

    let mined = mine_suffixes(&mining_universe, &remaining);
    rules.extend(mined.suffixes.into_iter().map(Rule::suffix));
    rules.extend(mined.literals.into_iter().map(Rule::literal));

    let (version, epoch) = next_counters(prior)?;
    tracing::debug!(
        "Compiled {} rules for {} invalidated URLs into version {}",
        rules.len(),
        invalidated.len(),
        version
    );

    let mut journal = prior.clone();
    journal.epoch = epoch;
    journal.entries.insert(0, Entry::with_rules(version, rules));

    let match_universe: BTreeSet<String> = universe.union(invalidated).cloned().collect();
    eliminate_redundancy(&mut journal, &match_universe)?;
    enforce_budget(&mut journal, settings.byte_budget);

    Ok(journal)
}

/// Compiles the journal for a total invalidation
///
/// The result holds a single version-only entry, so compiling it again from
/// its own output always has the same shape.
pub fn compile_forced(prior: &Journal, byte_budget: usize) -> Result<Journal, PlanError> {
    let (version, epoch) = next_counters(prior)?;
    let mut journal = Journal {
        epoch,
        entries: vec![Entry::version_only(version)],
    };
    enforce_budget(&mut journal, byte_budget);
    Ok(journal)
}

fn next_counters(prior: &Journal) -> Result<(u64, u64), PlanError> {
    let version = prior
        .next_version()
        .ok_or(PlanError::CounterExhausted { counter: "version" })?;
    let epoch = prior
        .next_epoch()
        .ok_or(PlanError::CounterExhausted { counter: "epoch" })?;
    Ok((version, epoch))
}

/// Dispatches an [`AnalyzerResult`] to the ordinary or forced compiler
#[derive(Debug, Clone, Default)]
pub struct UpdatePlanner {
    settings: PlanSettings,
}

impl UpdatePlanner {
    pub fn new(settings: PlanSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlanSettings {
        &self.settings
    }

    /// Compiles the next journal for a classified diff
    pub fn plan(
        &self,
        universe: &BTreeSet<String>,
        analysis: &AnalyzerResult,
        prior: &Journal,
    ) -> Result<Journal, PlanError> {
        if analysis.force {
            tracing::info!("Total invalidation requested, resetting journal");
            return compile_forced(prior, self.settings.byte_budget);
        }

        compile(universe, &analysis.invalidated(), &self.settings, prior)
    }
}
