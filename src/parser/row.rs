//! Row classification and substitution-entry parsing.
//!
//! Each logical table row carries 9 ordered cells: className, lesson,
//! subject, substituteTeacher, teacher, type, substituteOf, room, text.
//! A row whose lesson cell is not a lesson number continues the previous
//! entry's text instead of starting a new one.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::{clean_cell, contains_digit, ParseWarning};
use crate::models::SubstituteEntry;

/// Cells per substitution row in the source markup.
pub const ENTRY_CELLS: usize = 9;

static LESSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})(?:\s*-\s*(\d{1,2}))?$").expect("valid lesson regex"));

/// Classification of one raw table row, produced once and dispatched
/// exhaustively instead of scattering cell heuristics through the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Entry row for a digit-leading class name ("5a".."10e").
    LowerGradeRow,
    /// Entry row for a letter-coded cohort ("E1".."Q4").
    UpperGradeRow,
    /// Text continuation of the previous entry row.
    ContinuationRow,
}

impl RowKind {
    /// Classify a row by its leading cells.
    ///
    /// An entry row needs a class cell followed by a lesson cell matching
    /// the lesson-number pattern; anything else continues the previous row.
    pub fn classify(cells: &[String]) -> Self {
        let class = cells.first().map(|c| c.trim()).unwrap_or("");
        let lesson_ok = cells.len() >= 2 && LESSON_RE.is_match(cells[1].trim());
        if class.is_empty() || !lesson_ok {
            return Self::ContinuationRow;
        }
        if class.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            Self::LowerGradeRow
        } else {
            Self::UpperGradeRow
        }
    }
}

/// Parse one entry row into its expanded entries.
///
/// A collapsed lesson range ("3-4") legitimately yields one entry per
/// lesson in the inclusive range, all sharing the remaining fields.
pub fn parse_entry_row(
    cells: &[String],
    date: NaiveDate,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<SubstituteEntry> {
    let mut cells: Vec<String> = cells.iter().map(|c| clean_cell(c)).collect();
    if cells.len() < ENTRY_CELLS {
        warnings.push(ParseWarning::ShortRow(cells.len()));
        cells.resize(ENTRY_CELLS, String::new());
    }

    let lessons = match expand_lessons(&cells[1]) {
        Some(lessons) => lessons,
        None => {
            warnings.push(ParseWarning::BadLessonCell(cells[1].clone()));
            return Vec::new();
        }
    };

    lessons
        .into_iter()
        .map(|lesson| SubstituteEntry {
            id: None,
            date,
            class_name: cells[0].clone(),
            lesson,
            subject: digit_gated(&cells[2]),
            substitute_teacher: non_blank(&cells[3]),
            teacher: non_blank(&cells[4]),
            kind: cells[5].clone(),
            substitute_of: digit_gated(&cells[6]),
            room: room_cell(&cells[7]),
            text: non_blank(&cells[8]),
        })
        .collect()
}

/// Trailing text of a continuation row: its last non-empty cell.
pub fn continuation_text(cells: &[String]) -> Option<String> {
    cells
        .iter()
        .rev()
        .map(|c| clean_cell(c))
        .find(|c| !c.is_empty())
}

/// Expand a lesson cell into its inclusive lesson range.
fn expand_lessons(cell: &str) -> Option<Vec<u32>> {
    let caps = LESSON_RE.captures(cell.trim())?;
    let start: u32 = caps[1].parse().ok()?;
    let end: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => start,
    };
    if end < start {
        return Some(vec![start]);
    }
    Some((start..=end).collect())
}

fn non_blank(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (!cell.is_empty()).then(|| cell.to_string())
}

/// Subject-like cells are only real when they carry a digit; everything
/// else is a placeholder dash in the source.
fn digit_gated(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (contains_digit(cell)).then(|| cell.to_string())
}

fn room_cell(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (!cell.is_empty() && cell != "---").then(|| cell.to_string())
}
