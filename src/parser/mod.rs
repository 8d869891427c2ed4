//! Parsing for the hand-authored HTML substitution pages.
//!
//! The source markup is irregular: per-row tables with text continuations,
//! collapsed lesson ranges, date headers interleaved between tables, and a
//! class directory hidden in an inline script. Everything recoverable is
//! reported as a [`ParseWarning`] instead of failing the run.

pub mod date;
pub mod message;
pub mod nav;
pub mod plan;
pub mod row;

pub use date::DateCursor;
pub use plan::{parse_week_page, ParseOutcome};

use thiserror::Error;

/// Recoverable oddities encountered while parsing a plan page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseWarning {
    #[error("day header {0:?} carries no parseable date; keeping previous date")]
    BadDateHeader(String),

    #[error("table row appeared before any day header and was skipped")]
    RowBeforeDateHeader,

    #[error("substitution row has {0} cells, expected 9")]
    ShortRow(usize),

    #[error("lesson cell {0:?} is neither a lesson number nor a range")]
    BadLessonCell(String),
}

/// Normalise a table-cell text: collapse non-breaking spaces, trim.
pub(crate) fn clean_cell(raw: &str) -> String {
    raw.replace('\u{a0}', " ").trim().to_string()
}

/// Heuristic separating real subject/course codes from placeholder dashes.
pub(crate) fn contains_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}
