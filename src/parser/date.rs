//! Week/date resolution.
//!
//! The source never repeats the year per day: week selector labels carry it
//! as a suffix after their last `.`, while day headers only carry a
//! day-month pair ("12.09."). The cursor combining both is an explicit
//! value threaded through the page walk, never shared parser state.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::ParseWarning;

static DAY_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\.(\d{1,2})\.?").expect("valid day-month regex"));

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*$").expect("valid year regex"));

/// The "current date" while walking one week page.
///
/// Day headers advance the cursor; every row parsed afterwards belongs to
/// the cursor's date until the next header. A malformed header keeps the
/// previous value so the surrounding rows still land on a plausible date.
#[derive(Debug, Clone)]
pub struct DateCursor {
    year: i32,
    current: Option<NaiveDate>,
}

impl DateCursor {
    /// Start a cursor for the year taken from the week selector.
    pub fn new(year: i32) -> Self {
        Self {
            year,
            current: None,
        }
    }

    /// The date rows are currently attributed to, if any header resolved yet.
    pub fn current(&self) -> Option<NaiveDate> {
        self.current
    }

    /// Resolve a day header and advance the cursor.
    ///
    /// Returns the resolved date, or a [`ParseWarning`] when the header has
    /// no parseable day-month pair; the cursor then keeps its last value.
    pub fn advance(&mut self, header: &str) -> Result<NaiveDate, ParseWarning> {
        let resolved = DAY_MONTH_RE.captures(header).and_then(|caps| {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            NaiveDate::from_ymd_opt(self.year, month, day)
        });
        match resolved {
            Some(date) => {
                self.current = Some(date);
                Ok(date)
            }
            None => Err(ParseWarning::BadDateHeader(header.trim().to_string())),
        }
    }
}

/// Extract the year suffix from a week selector label ("21.08.-25.08.2023").
pub fn year_from_week_label(label: &str) -> Option<i32> {
    YEAR_RE
        .captures(label.trim())
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_header_combines_with_selector_year() {
        let mut cursor = DateCursor::new(2023);
        let date = cursor.advance("Dienstag, 12.09.").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 9, 12).unwrap());
        assert_eq!(cursor.current(), Some(date));
    }

    #[test]
    fn unparseable_header_keeps_previous_value() {
        let mut cursor = DateCursor::new(2023);
        cursor.advance("12.09.").unwrap();
        let err = cursor.advance("Vertretungen").unwrap_err();
        assert_eq!(err, ParseWarning::BadDateHeader("Vertretungen".to_string()));
        assert_eq!(
            cursor.current(),
            Some(NaiveDate::from_ymd_opt(2023, 9, 12).unwrap())
        );
    }

    #[test]
    fn header_before_any_date_leaves_cursor_empty() {
        let mut cursor = DateCursor::new(2023);
        assert!(cursor.advance("kein Datum").is_err());
        assert_eq!(cursor.current(), None);
    }

    #[test]
    fn year_suffix_extraction() {
        assert_eq!(year_from_week_label("21.08.-25.08.2023"), Some(2023));
        assert_eq!(year_from_week_label("Woche 34 - 21.8.2023"), Some(2023));
        assert_eq!(year_from_week_label("keine Woche"), None);
    }
}
