//! Notification topics and dispatch payloads.
//!
//! Clients subscribe to hierarchical topic strings of the form
//! `substitute.timetable.<weekday 1-7>.<lesson>.<teacherAbbreviationOrClassName>`.
//! Topics are modelled as a typed value with a single encode/parse pair so
//! that generation and lookup cannot drift apart.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::SubstituteEntry;

/// Common prefix of all substitution topics.
pub const TOPIC_PREFIX: &str = "substitute.timetable";

/// Who a topic addresses.
///
/// The encoded grammar does not distinguish a teacher abbreviation from a
/// letter-coded cohort name, so `parse` infers `Class` only for
/// digit-leading keys and defaults to `Teacher` otherwise. Resolution
/// against registered topics compares encoded strings, so the inferred kind
/// never affects lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Teacher(String),
    Class(String),
}

impl Audience {
    /// The key as it appears in the encoded topic.
    pub fn key(&self) -> &str {
        match self {
            Self::Teacher(key) | Self::Class(key) => key,
        }
    }
}

/// A typed notification topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// ISO weekday, 1 = Monday .. 7 = Sunday.
    pub weekday: u32,
    pub lesson: u32,
    pub audience: Audience,
}

impl Topic {
    /// Encode into the wire form clients register with.
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            TOPIC_PREFIX,
            self.weekday,
            self.lesson,
            self.audience.key()
        )
    }

    /// Parse a registered topic string back into its typed form.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix(TOPIC_PREFIX)?.strip_prefix('.')?;
        let mut parts = rest.splitn(3, '.');
        let weekday: u32 = parts.next()?.parse().ok()?;
        let lesson: u32 = parts.next()?.parse().ok()?;
        let key = parts.next()?;
        if !(1..=7).contains(&weekday) || key.is_empty() {
            return None;
        }
        let audience = if key.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            Audience::Class(key.to_string())
        } else {
            Audience::Teacher(key.to_string())
        };
        Some(Self {
            weekday,
            lesson,
            audience,
        })
    }

    /// Topics addressed by one notification-eligible entry: one for the
    /// teacher (when present) and one for the class name (when present).
    pub fn for_entry(entry: &SubstituteEntry) -> Vec<Topic> {
        let weekday = entry.date.weekday().number_from_monday();
        let mut topics = Vec::with_capacity(2);
        if let Some(teacher) = entry.teacher.as_deref() {
            if !teacher.trim().is_empty() {
                topics.push(Topic {
                    weekday,
                    lesson: entry.lesson,
                    audience: Audience::Teacher(teacher.to_string()),
                });
            }
        }
        if !entry.class_name.trim().is_empty() {
            topics.push(Topic {
                weekday,
                lesson: entry.lesson,
                audience: Audience::Class(entry.class_name.clone()),
            });
        }
        topics
    }
}

/// Payload handed to the dispatch collaborator alongside the token set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Dates that saw at least one genuine change this cycle.
    pub dates: Vec<NaiveDate>,
    /// Number of changed entries across those dates.
    pub changes: usize,
}

impl NotificationPayload {
    /// Summarise a batch of changed entries.
    pub fn for_changes(entries: &[SubstituteEntry]) -> Self {
        let mut dates: Vec<NaiveDate> = entries.iter().map(|e| e.date).collect();
        dates.sort_unstable();
        dates.dedup();
        let body = match dates.as_slice() {
            [single] => format!("Der Vertretungsplan für {single} wurde aktualisiert."),
            _ => format!(
                "Der Vertretungsplan wurde für {} Tage aktualisiert.",
                dates.len()
            ),
        };
        Self {
            title: "Vertretungsplan".to_string(),
            body,
            dates,
            changes: entries.len(),
        }
    }
}

/// A registered client token with its subscribed topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRegistration {
    pub token: String,
    pub topics: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_parse_round_trip() {
        let topic = Topic {
            weekday: 1,
            lesson: 2,
            audience: Audience::Class("9a".to_string()),
        };
        assert_eq!(topic.encode(), "substitute.timetable.1.2.9a");
        assert_eq!(Topic::parse(&topic.encode()), Some(topic));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Topic::parse("substitute.timetable.1.2"), None);
        assert_eq!(Topic::parse("substitute.timetable.8.2.ABC"), None);
        assert_eq!(Topic::parse("grades.timetable.1.2.ABC"), None);
        assert_eq!(Topic::parse("substitute.timetable.x.2.ABC"), None);
    }

    #[test]
    fn entry_fans_out_to_teacher_and_class() {
        // 2023-09-11 is a Monday.
        let date = NaiveDate::from_ymd_opt(2023, 9, 11).unwrap();
        assert_eq!(date.weekday().number_from_monday(), 1);
        let entry = SubstituteEntry {
            id: None,
            date,
            class_name: "9a".to_string(),
            lesson: 2,
            subject: None,
            substitute_teacher: None,
            teacher: Some("ABC".to_string()),
            kind: "Vertretung".to_string(),
            substitute_of: None,
            room: None,
            text: None,
        };
        let encoded: Vec<String> = Topic::for_entry(&entry).iter().map(Topic::encode).collect();
        assert_eq!(
            encoded,
            vec![
                "substitute.timetable.1.2.ABC".to_string(),
                "substitute.timetable.1.2.9a".to_string(),
            ]
        );
    }

    #[test]
    fn entry_without_teacher_fans_out_to_class_only() {
        let date = NaiveDate::from_ymd_opt(2023, 9, 11).unwrap();
        let entry = SubstituteEntry {
            id: None,
            date,
            class_name: "Q2".to_string(),
            lesson: 5,
            subject: Some("eng2".to_string()),
            substitute_teacher: None,
            teacher: None,
            kind: "Entfall".to_string(),
            substitute_of: None,
            room: None,
            text: None,
        };
        let topics = Topic::for_entry(&entry);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].encode(), "substitute.timetable.1.5.Q2");
    }
}
