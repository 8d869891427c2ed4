//! Diff & reconciliation engine.
//!
//! Freshly parsed candidates for one date are matched against the stored
//! rows for that date. Unchanged rows are dropped from further processing,
//! matched rows are updated in place keeping their identity, everything
//! else is inserted fresh, and stored rows matched by nothing are removed:
//! the date's table is authoritative from the latest fetch.
//!
//! Matching is an explicit two-branch strategy keyed by [`ClassNameShape`]:
//! lower-grade names identify a unique row per date/lesson by themselves
//! (with a LIKE pattern tolerating combined rows like "5abc"), while
//! upper-grade cohorts are correlated by teacher, or by subject when the
//! candidate carries no teacher.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{ClassNameShape, SubstituteEntry};
use crate::repository::{PlanRepository, Result};

/// What one reconciliation pass did to a date's rows.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Entries inserted or updated in place — the notification-eligible set.
    pub changed: Vec<SubstituteEntry>,
    pub inserted: usize,
    pub updated: usize,
    /// Candidates identical to a stored row, dropped without a write.
    pub unchanged: usize,
    /// Stored rows absent from the candidate set, deleted.
    pub removed: usize,
}

/// LIKE pattern for a lower-grade class name: leading digit group, then the
/// first trailing letter, each followed by a wildcard. "6b" yields `6%b%`,
/// matching both a stored "6b" and a combined "6bc"; a combined candidate
/// "5abc" yields `5%a%`, matching a stored "5a".
pub fn class_pattern(class_name: &str) -> String {
    let digits: String = class_name
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let letter = class_name
        .chars()
        .skip(digits.chars().count())
        .find(|c| c.is_alphabetic());
    match letter {
        Some(letter) => format!("{digits}%{letter}%"),
        None => format!("{digits}%"),
    }
}

/// Reconcile one date's candidates against the store.
pub fn reconcile_date(
    repo: &PlanRepository,
    date: NaiveDate,
    candidates: Vec<SubstituteEntry>,
) -> Result<ReconcileOutcome> {
    let stored = repo.entries_for_date(date)?;
    let mut matched: HashSet<i64> = HashSet::new();
    let mut outcome = ReconcileOutcome::default();

    // Step 1: byte-for-byte identical candidates are unchanged — no write,
    // no notification. The stored row is claimed so it survives step 3.
    let mut pending = Vec::new();
    for candidate in candidates {
        let identical = stored.iter().find(|s| {
            matches!(s.id, Some(id) if !matched.contains(&id)) && s.same_content(&candidate)
        });
        match identical.and_then(|s| s.id) {
            Some(id) => {
                matched.insert(id);
                outcome.unchanged += 1;
            }
            None => pending.push(candidate),
        }
    }

    // Step 2: shape-keyed matching; hit means in-place update, miss means
    // a fresh insert. Either way the candidate is notification-eligible.
    for mut candidate in pending {
        let hit = find_match(repo, date, &candidate, &matched)?;
        match hit {
            Some(id) => {
                candidate.id = Some(id);
                repo.update_entry(&candidate)?;
                matched.insert(id);
                outcome.updated += 1;
                outcome.changed.push(candidate);
            }
            None => {
                let id = repo.insert_entry(&candidate)?;
                candidate.id = Some(id);
                // Claim the fresh row too, or a later candidate with an
                // overlapping lookup pattern would overwrite it.
                matched.insert(id);
                outcome.inserted += 1;
                outcome.changed.push(candidate);
            }
        }
    }

    // Step 3: stored rows claimed by no candidate are gone from the plan.
    let leftover: Vec<i64> = stored
        .iter()
        .filter_map(|s| s.id)
        .filter(|id| !matched.contains(id))
        .collect();
    outcome.removed = repo.delete_entries(&leftover)?;

    debug!(
        %date,
        inserted = outcome.inserted,
        updated = outcome.updated,
        unchanged = outcome.unchanged,
        removed = outcome.removed,
        "reconciled date"
    );
    Ok(outcome)
}

/// Find the stored row a candidate corresponds to, skipping rows already
/// claimed by another candidate this cycle.
fn find_match(
    repo: &PlanRepository,
    date: NaiveDate,
    candidate: &SubstituteEntry,
    matched: &HashSet<i64>,
) -> Result<Option<i64>> {
    let rows = match candidate.shape() {
        ClassNameShape::LowerGrade => {
            let pattern = class_pattern(&candidate.class_name);
            repo.find_by_class_pattern(date, candidate.lesson, &pattern)?
        }
        ClassNameShape::UpperGrade => {
            let teacher = candidate
                .teacher
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty());
            match teacher {
                Some(teacher) => repo.find_by_teacher(date, candidate.lesson, teacher)?,
                None => match candidate.subject.as_deref() {
                    Some(subject) => repo.find_by_subject(date, candidate.lesson, subject)?,
                    // Nothing reliable to correlate on: treat as new.
                    None => Vec::new(),
                },
            }
        }
    };

    Ok(rows
        .into_iter()
        .filter_map(|row| row.id)
        .find(|id| !matched.contains(id)))
}
