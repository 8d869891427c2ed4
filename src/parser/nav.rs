//! Navigation-page extraction: selectable weeks and the class directory.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::date::year_from_week_label;

static WEEK_OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("select option").expect("valid option selector"));

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("valid script selector"));

static CLASSES_ARRAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var classes\s*=\s*\[([^\]]*)\]").expect("valid classes regex"));

static STRING_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid literal regex"));

/// One selectable week on the navigation page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekRef {
    /// Option value, substituted into the week page URL template.
    pub code: String,
    /// Year embedded after the last `.` of the option label.
    pub year: i32,
}

/// Extract the selectable weeks from the navigation page.
///
/// Options whose label carries no year suffix are skipped; the plan host
/// pads the list with placeholder options outside the school year.
pub fn extract_weeks(html: &str) -> Vec<WeekRef> {
    let document = Html::parse_document(html);
    let mut weeks = Vec::new();
    for option in document.select(&WEEK_OPTION_SELECTOR) {
        let code = match option.value().attr("value") {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => continue,
        };
        let label: String = option.text().collect();
        if let Some(year) = year_from_week_label(&label) {
            weeks.push(WeekRef { code, year });
        }
    }
    weeks
}

/// Pull the authoritative set of active class names out of the embedded
/// `var classes = [...]` script literal on the navigation page.
pub fn extract_classes(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    for script in document.select(&SCRIPT_SELECTOR) {
        let source: String = script.text().collect();
        if let Some(caps) = CLASSES_ARRAY_RE.captures(&source) {
            return STRING_LITERAL_RE
                .captures_iter(&caps[1])
                .map(|c| c[1].to_string())
                .collect();
        }
    }
    Vec::new()
}
