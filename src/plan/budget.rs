//! Journal size bounding

use crate::journal::{Entry, Journal};

/// What [`enforce_budget`] had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetOutcome {
    /// Every entry fits
    Kept,

    /// Older entries were cut from the tail
    Truncated { dropped: usize },

    /// The newest entry alone exceeded the budget and lost its rules;
    /// every older entry was dropped
    Degraded,
}

/// Truncates the journal so its entries fit in `byte_budget` bytes
///
/// Entry sizes are their compact JSON encodings, accumulated newest to
/// oldest with one separator byte between neighbours. The newest entry is
/// never dropped. The result is always a newest-first prefix of the input,
/// except that a degraded newest entry keeps only its version.
pub fn enforce_budget(journal: &mut Journal, byte_budget: usize) -> BudgetOutcome {
    let Some(newest) = journal.entries.first() else {
        return BudgetOutcome::Kept;
    };

    let mut used = newest.encoded_len();
    if used > byte_budget {
        let version = newest.version;
        tracing::warn!(
            "Newest journal entry ({} bytes) exceeds budget of {} bytes, degrading to version-only",
            used,
            byte_budget
        );
        journal.entries.clear();
        journal.entries.push(Entry::version_only(version));
        return BudgetOutcome::Degraded;
    }

    let mut keep = 1;
    for entry in &journal.entries[1..] {
        let size = entry.encoded_len() + 1;
        if used + size > byte_budget {
            break;
        }
        used += size;
        keep += 1;
    }

    let dropped = journal.entries.len() - keep;
    if dropped == 0 {
        return BudgetOutcome::Kept;
    }

    journal.entries.truncate(keep);
    tracing::warn!(
        "Journal exceeds budget of {} bytes, dropped {} oldest entries",
        byte_budget,
        dropped
    );
    BudgetOutcome::Truncated { dropped }
}
