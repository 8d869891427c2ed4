//! Whole-page walk over the substitution container.
//!
//! The container's children alternate `<p>` date headers (bolded day-month
//! text) with tables: `subst`-classed tables hold entry rows, anything else
//! is a free-text message block for the current date.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::date::DateCursor;
use super::message::parse_message_rows;
use super::row::{continuation_text, parse_entry_row, RowKind};
use super::{clean_cell, ParseWarning};
use crate::models::{SubstituteEntry, SubstituteMessage};

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid body selector"));

static TR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid tr selector"));

static TD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid td selector"));

static B_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("b").expect("valid b selector"));

/// Everything parsed out of one week page.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub entries: Vec<SubstituteEntry>,
    pub messages: Vec<SubstituteMessage>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse one week page.
///
/// The date cursor is owned by the caller and threaded through explicitly;
/// headers on this page advance it, rows consume its current value.
pub fn parse_week_page(html: &str, container_selector: &str, cursor: &mut DateCursor) -> ParseOutcome {
    let document = Html::parse_document(html);
    let mut outcome = ParseOutcome::default();

    let container = match Selector::parse(container_selector) {
        Ok(selector) => document.select(&selector).next(),
        Err(_) => None,
    };
    let container = match container.or_else(|| document.select(&BODY_SELECTOR).next()) {
        Some(el) => el,
        None => return outcome,
    };

    for node in container.children() {
        let element = match ElementRef::wrap(node) {
            Some(el) => el,
            None => continue,
        };
        match element.value().name() {
            "p" => handle_header(element, cursor, &mut outcome),
            "table" => handle_table(element, cursor, &mut outcome),
            _ => {}
        }
    }

    debug!(
        entries = outcome.entries.len(),
        messages = outcome.messages.len(),
        warnings = outcome.warnings.len(),
        "parsed week page"
    );
    outcome
}

fn handle_header(element: ElementRef<'_>, cursor: &mut DateCursor, outcome: &mut ParseOutcome) {
    let header: String = match element.select(&B_SELECTOR).next() {
        Some(b) => b.text().collect(),
        None => return,
    };
    let header = clean_cell(&header);
    if header.is_empty() {
        return;
    }
    if let Err(warning) = cursor.advance(&header) {
        outcome.warnings.push(warning);
    }
}

fn handle_table(element: ElementRef<'_>, cursor: &mut DateCursor, outcome: &mut ParseOutcome) {
    let rows = collect_rows(element);
    if is_subst_table(element) {
        handle_entry_table(&rows, cursor, outcome);
    } else {
        let date = match cursor.current() {
            Some(date) => date,
            None => {
                outcome.warnings.push(ParseWarning::RowBeforeDateHeader);
                return;
            }
        };
        let message = parse_message_rows(&rows, date);
        if !message.is_empty() {
            outcome.messages.push(message);
        }
    }
}

fn handle_entry_table(
    rows: &[Vec<String>],
    cursor: &mut DateCursor,
    outcome: &mut ParseOutcome,
) {
    // Indices of the entries the previous logical row expanded into;
    // continuation text applies to all of them.
    let mut previous: Vec<usize> = Vec::new();

    for cells in rows {
        match RowKind::classify(cells) {
            RowKind::LowerGradeRow | RowKind::UpperGradeRow => {
                let date = match cursor.current() {
                    Some(date) => date,
                    None => {
                        outcome.warnings.push(ParseWarning::RowBeforeDateHeader);
                        continue;
                    }
                };
                let expanded = parse_entry_row(cells, date, &mut outcome.warnings);
                let start = outcome.entries.len();
                previous = (start..start + expanded.len()).collect();
                outcome.entries.extend(expanded);
            }
            RowKind::ContinuationRow => {
                let text = match continuation_text(cells) {
                    Some(text) => text,
                    None => continue,
                };
                for &idx in &previous {
                    outcome.entries[idx].append_text(&text);
                }
            }
        }
    }
}

/// Reduce a table to its rows' cleaned cell texts.
fn collect_rows(table: ElementRef<'_>) -> Vec<Vec<String>> {
    table
        .select(&TR_SELECTOR)
        .map(|tr| {
            tr.select(&TD_SELECTOR)
                .map(|td| clean_cell(&td.text().collect::<String>()))
                .collect()
        })
        .filter(|cells: &Vec<String>| !cells.is_empty())
        .collect()
}

fn is_subst_table(table: ElementRef<'_>) -> bool {
    table
        .value()
        .attr("class")
        .unwrap_or("")
        .split_whitespace()
        .any(|class| class == "subst")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const WEEK_PAGE: &str = r#"
        <html><body><div id="vertretung">
          <p><b>12.9. Dienstag</b></p>
          <table class="subst">
            <tr><th>Klasse</th><th>Stunde</th></tr>
            <tr class="odd"><td>9a</td><td>3-4</td><td>Ma1</td><td>XYZ</td>
                <td>ABC</td><td>Vertretung</td><td>Ma1</td><td>112</td><td>Arbeit</td></tr>
            <tr class="even"><td>&nbsp;</td><td>siehe Moodle</td></tr>
            <tr class="odd"><td>Q2</td><td>5</td><td>eng2</td><td>&nbsp;</td>
                <td>&nbsp;</td><td>Entfall</td><td>---</td><td>---</td><td>&nbsp;</td></tr>
          </table>
          <table>
            <tr><td>Abwesende Lehrer</td><td>ABC, DEF</td></tr>
            <tr><td>Unterricht endet nach der 5. Stunde.</td></tr>
          </table>
          <p><b>13.9. Mittwoch</b></p>
          <table class="subst">
            <tr class="odd"><td>5a</td><td>2</td><td>--</td><td>GHI</td>
                <td>JKL</td><td>Vertretung</td><td>--</td><td>204</td><td>&nbsp;</td></tr>
          </table>
        </div></body></html>
    "#;

    fn parse(html: &str) -> ParseOutcome {
        let mut cursor = DateCursor::new(2023);
        parse_week_page(html, "#vertretung", &mut cursor)
    }

    #[test]
    fn walks_headers_tables_and_continuations() {
        let outcome = parse(WEEK_PAGE);
        assert!(outcome.warnings.is_empty());

        let tue = NaiveDate::from_ymd_opt(2023, 9, 12).unwrap();
        let wed = NaiveDate::from_ymd_opt(2023, 9, 13).unwrap();

        // 3-4 expanded, plus Q2, plus 5a on the next day.
        assert_eq!(outcome.entries.len(), 4);
        assert_eq!(outcome.entries[0].date, tue);
        assert_eq!(outcome.entries[0].lesson, 3);
        assert_eq!(outcome.entries[1].lesson, 4);
        // Continuation text lands on both expanded entries.
        assert_eq!(outcome.entries[0].text.as_deref(), Some("Arbeit siehe Moodle"));
        assert_eq!(outcome.entries[1].text.as_deref(), Some("Arbeit siehe Moodle"));
        assert_eq!(outcome.entries[2].class_name, "Q2");
        assert_eq!(outcome.entries[2].teacher, None);
        assert_eq!(outcome.entries[3].date, wed);
        assert_eq!(outcome.entries[3].class_name, "5a");

        assert_eq!(outcome.messages.len(), 1);
        let message = &outcome.messages[0];
        assert_eq!(message.date, tue);
        assert_eq!(message.absent_teachers.as_deref(), Some("ABC, DEF"));
        assert_eq!(
            message.messages.as_deref(),
            Some("Unterricht endet nach der 5. Stunde.")
        );
    }

    #[test]
    fn continuation_merging_yields_single_entry() {
        let html = r#"
            <div id="vertretung">
              <p><b>12.9.</b></p>
              <table class="subst">
                <tr><td>6b</td><td>2</td><td>De2</td><td></td><td>MNO</td>
                    <td>Vertretung</td><td></td><td>101</td><td>Aufgaben</td></tr>
                <tr><td></td><td>siehe Moodle</td></tr>
              </table>
            </div>
        "#;
        let outcome = parse(html);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(
            outcome.entries[0].text.as_deref(),
            Some("Aufgaben siehe Moodle")
        );
    }

    #[test]
    fn rows_before_any_header_are_skipped_with_warning() {
        let html = r#"
            <div id="vertretung">
              <table class="subst">
                <tr><td>6b</td><td>2</td><td>De2</td><td></td><td>MNO</td>
                    <td>Vertretung</td><td></td><td>101</td><td></td></tr>
              </table>
            </div>
        "#;
        let outcome = parse(html);
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.warnings, vec![ParseWarning::RowBeforeDateHeader]);
    }

    #[test]
    fn bad_header_falls_back_to_previous_date() {
        let html = r#"
            <div id="vertretung">
              <p><b>12.9.</b></p>
              <p><b>Vertretungen</b></p>
              <table class="subst">
                <tr><td>6b</td><td>2</td><td></td><td></td><td>MNO</td>
                    <td>Entfall</td><td></td><td>101</td><td></td></tr>
              </table>
            </div>
        "#;
        let outcome = parse(html);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(
            outcome.entries[0].date,
            NaiveDate::from_ymd_opt(2023, 9, 12).unwrap()
        );
        assert_eq!(
            outcome.warnings,
            vec![ParseWarning::BadDateHeader("Vertretungen".to_string())]
        );
    }
}
