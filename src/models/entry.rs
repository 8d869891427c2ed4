//! Substitution-plan models.
//!
//! A `SubstituteEntry` is one lesson of one class being covered, moved or
//! cancelled on a given date. Entries have no stable natural key across
//! scrape cycles; identity is re-derived each cycle by the reconciliation
//! engine, which is why stored rows carry an optional database id.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Shape of a class name, selecting the reconciliation strategy.
///
/// Numerically named classes ("5a".."10e") identify a unique row per
/// date/lesson by themselves. Letter-coded upper-level cohorts ("E1".."Q4")
/// share their name across unrelated courses, so teacher or subject is the
/// only reliable correlating key for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassNameShape {
    LowerGrade,
    UpperGrade,
}

impl ClassNameShape {
    /// Classify a class name by its leading character.
    pub fn of(class_name: &str) -> Self {
        if class_name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            Self::LowerGrade
        } else {
            Self::UpperGrade
        }
    }
}

/// One row of the daily substitution plan, post lesson-range expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstituteEntry {
    /// Database row id; `None` for freshly parsed candidates.
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub class_name: String,
    /// Single lesson number; collapsed ranges are expanded before this
    /// struct is built.
    pub lesson: u32,
    pub subject: Option<String>,
    pub substitute_teacher: Option<String>,
    pub teacher: Option<String>,
    /// Substitution type as printed in the plan (e.g. "Vertretung",
    /// "Entfall", "Raum-Vtr.").
    pub kind: String,
    pub substitute_of: Option<String>,
    pub room: Option<String>,
    pub text: Option<String>,
}

impl SubstituteEntry {
    /// Reconciliation strategy for this entry's class name.
    pub fn shape(&self) -> ClassNameShape {
        ClassNameShape::of(&self.class_name)
    }

    /// Field-by-field equality ignoring the database id.
    ///
    /// Used by the reconciliation engine to suppress rows that did not
    /// change between two scrape cycles.
    pub fn same_content(&self, other: &Self) -> bool {
        self.date == other.date
            && self.class_name == other.class_name
            && self.lesson == other.lesson
            && self.subject == other.subject
            && self.substitute_teacher == other.substitute_teacher
            && self.teacher == other.teacher
            && self.kind == other.kind
            && self.substitute_of == other.substitute_of
            && self.room == other.room
            && self.text == other.text
    }

    /// Append continuation-row text, space-joined, to this entry.
    pub fn append_text(&mut self, more: &str) {
        let more = more.trim();
        if more.is_empty() {
            return;
        }
        match &mut self.text {
            Some(text) => {
                text.push(' ');
                text.push_str(more);
            }
            None => self.text = Some(more.to_string()),
        }
    }
}

/// Free-text messages attached to one plan date.
///
/// At most one message row exists per date; each scrape cycle fully
/// replaces it (delete-then-insert), there is no partial-field merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstituteMessage {
    pub date: NaiveDate,
    pub absent_teachers: Option<String>,
    pub absent_classes: Option<String>,
    pub affected_classes: Option<String>,
    pub affected_rooms: Option<String>,
    pub blocked_rooms: Option<String>,
    pub messages: Option<String>,
}

impl SubstituteMessage {
    /// Create an empty message block for a date.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ..Default::default()
        }
    }

    /// True when no field carries any text.
    pub fn is_empty(&self) -> bool {
        self.absent_teachers.is_none()
            && self.absent_classes.is_none()
            && self.affected_classes.is_none()
            && self.affected_rooms.is_none()
            && self.blocked_rooms.is_none()
            && self.messages.is_none()
    }
}
