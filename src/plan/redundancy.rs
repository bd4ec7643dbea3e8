//! Cross-entry redundancy elimination
//!
//! Once the newest entry invalidates a set of URLs, any older rule value that
//! only matches URLs inside that set no longer tells a client anything new.

use crate::journal::{Journal, Matcher, Rule, RuleKind, RuleValue};
use crate::plan::PlanError;
use std::collections::BTreeSet;

/// Removes older rule values made redundant by the newest entry
///
/// Match sets are evaluated against `universe`. Rules whose value list
/// becomes empty are dropped, single-member lists collapse to a scalar, and
/// entries left without rules become version-only. Running this twice yields
/// the same journal as running it once.
///
/// # Returns
///
/// The number of rule values removed
pub fn eliminate_redundancy(
    journal: &mut Journal,
    universe: &BTreeSet<String>,
) -> Result<usize, PlanError> {
    let Some((newest, older)) = journal.entries.split_first_mut() else {
        return Ok(0);
    };

    let mut newest_matchers = Vec::new();
    for rule in newest.rules() {
        newest_matchers.extend(compile(rule, newest.version)?);
    }

    let fresh: BTreeSet<&str> = universe
        .iter()
        .map(String::as_str)
        .filter(|url| newest_matchers.iter().any(|m| m.matches(url)))
        .collect();

    let is_redundant = |matcher: &Matcher| {
        universe
            .iter()
            .filter(|url| matcher.matches(url))
            .all(|url| fresh.contains(url.as_str()))
    };

    let mut removed = 0;
    for entry in older.iter_mut() {
        let Some(rules) = entry.rules.take() else {
            continue;
        };

        let mut kept = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.kind == RuleKind::Html {
                if is_redundant(&Matcher::Html) {
                    removed += 1;
                } else {
                    kept.push(rule);
                }
                continue;
            }

            // Value-less rules fail here just as they do in the newest entry
            let matchers = compile(&rule, entry.version)?;
            let mut members = Vec::new();
            for (member, matcher) in rule.members().iter().zip(&matchers) {
                if is_redundant(matcher) {
                    removed += 1;
                } else {
                    members.push(member.clone());
                }
            }

            if let Some(value) = RuleValue::from_members(members) {
                kept.push(Rule {
                    kind: rule.kind,
                    value: Some(value),
                });
            }
        }

        entry.rules = if kept.is_empty() { None } else { Some(kept) };
    }

    if removed > 0 {
        tracing::debug!("Removed {} redundant rule values from older entries", removed);
    }

    Ok(removed)
}

fn compile(rule: &Rule, version: u64) -> Result<Vec<Matcher>, PlanError> {
    rule.matchers()
        .map_err(|source| PlanError::InvalidRule { version, source })
}
