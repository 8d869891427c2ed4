//! Free-text message tables.
//!
//! Tables without the `subst` class hold the day's general messages as
//! label/value cell pairs. Labels are dispatched on prefix; unlabeled rows
//! accumulate into the `messages` field.

use chrono::NaiveDate;

use super::clean_cell;
use crate::models::SubstituteMessage;

/// Parse a message table's rows (already reduced to cell texts).
pub fn parse_message_rows(rows: &[Vec<String>], date: NaiveDate) -> SubstituteMessage {
    let mut message = SubstituteMessage::new(date);

    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| clean_cell(c)).collect();
        let label = cells.first().map(String::as_str).unwrap_or("");
        let value = cells
            .iter()
            .skip(1)
            .filter(|c| !c.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        let field = match label {
            l if l.starts_with("Abwesende Lehrer") => Some(&mut message.absent_teachers),
            l if l.starts_with("Abwesende Klassen") => Some(&mut message.absent_classes),
            l if l.starts_with("Betroffene Klassen") => Some(&mut message.affected_classes),
            l if l.starts_with("Betroffene Räume") => Some(&mut message.affected_rooms),
            l if l.starts_with("Blockierte Räume") => Some(&mut message.blocked_rooms),
            _ => None,
        };

        match field {
            Some(slot) if !value.is_empty() => *slot = Some(value),
            Some(_) => {}
            None => {
                // Unlabeled pair: everything in the row is free text.
                let text = cells
                    .iter()
                    .filter(|c| !c.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ");
                if !text.is_empty() {
                    append(&mut message.messages, &text);
                }
            }
        }
    }

    message
}

fn append(slot: &mut Option<String>, text: &str) {
    match slot {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(text);
        }
        None => *slot = Some(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 9, 12).unwrap()
    }

    #[test]
    fn labeled_pairs_dispatch_on_prefix() {
        let message = parse_message_rows(
            &rows(&[
                &["Abwesende Lehrer", "ABC, DEF"],
                &["Blockierte Räume", "Aula"],
                &["Betroffene Klassen", "5a, 6b"],
                &["Betroffene Räume", "112"],
                &["Abwesende Klassen", "Q2"],
            ]),
            date(),
        );
        assert_eq!(message.absent_teachers.as_deref(), Some("ABC, DEF"));
        assert_eq!(message.blocked_rooms.as_deref(), Some("Aula"));
        assert_eq!(message.affected_classes.as_deref(), Some("5a, 6b"));
        assert_eq!(message.affected_rooms.as_deref(), Some("112"));
        assert_eq!(message.absent_classes.as_deref(), Some("Q2"));
        assert_eq!(message.messages, None);
    }

    #[test]
    fn unlabeled_rows_accumulate_into_messages() {
        let message = parse_message_rows(
            &rows(&[
                &["Sporthalle gesperrt."],
                &["Elternabend", "ab 19 Uhr"],
            ]),
            date(),
        );
        assert_eq!(
            message.messages.as_deref(),
            Some("Sporthalle gesperrt. Elternabend ab 19 Uhr")
        );
    }

    #[test]
    fn empty_table_is_empty_message() {
        let message = parse_message_rows(&rows(&[]), date());
        assert!(message.is_empty());
        assert_eq!(message.date, date());
    }
}
