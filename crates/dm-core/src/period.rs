//! Period (`YYYYMM`) extraction from loosely formatted date cells

use crate::table::CellValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// First date-looking fragment inside free text
static EMBEDDED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4}[-/]\d{1,2}[-/]\d{1,2})|(\d{1,2}[-/]\d{1,2}[-/]\d{4})")
        .expect("embedded date pattern is valid")
});

/// Preferred reading of purely numeric dates such as `03/04/2023`
///
/// The preferred order is tried first and the other one second, so an
/// unambiguous date like `15/07/2023` parses under either setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

const YEAR_FIRST_DATE_TIMES: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const YEAR_FIRST_DATES: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

const DAY_FIRST_DATE_TIMES: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const DAY_FIRST_DATES: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

const MONTH_FIRST_DATE_TIMES: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m-%d-%Y %H:%M:%S",
    "%m-%d-%Y %H:%M",
];

const MONTH_FIRST_DATES: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%m.%d.%Y"];

const NO_FORMATS: &[&str] = &[];

/// Dates spelling out the month name; never ambiguous
const NAMED_MONTH_DATES: &[&str] = &["%d %B %Y", "%B %d, %Y", "%B %d %Y", "%d-%b-%Y"];

impl DateOrder {
    fn numeric_formats(self) -> [(&'static [&'static str], &'static [&'static str]); 2] {
        let day_first = (DAY_FIRST_DATE_TIMES, DAY_FIRST_DATES);
        let month_first = (MONTH_FIRST_DATE_TIMES, MONTH_FIRST_DATES);
        match self {
            DateOrder::DayFirst => [day_first, month_first],
            DateOrder::MonthFirst => [month_first, day_first],
        }
    }
}

/// Parse a date or timestamp from text using the fixed format set
pub fn parse_date(text: &str, order: DateOrder) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    let mut groups = vec![(YEAR_FIRST_DATE_TIMES, YEAR_FIRST_DATES)];
    groups.extend(order.numeric_formats());
    groups.push((NO_FORMATS, NAMED_MONTH_DATES));

    groups.into_iter().find_map(|(date_times, dates)| {
        date_times
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .or_else(|| {
                dates
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
    })
}

/// Extract a `YYYYMM` period from a cell, or `""` when no date can be found
///
/// Date cells are formatted directly. Text is parsed as a whole first; failing
/// that, the first embedded `yyyy-m-d` or `d-m-yyyy` fragment (either
/// separator) is parsed instead.
pub fn extract_period(value: &CellValue, order: DateOrder) -> String {
    let text = match value {
        CellValue::Empty => return String::new(),
        CellValue::Date(dt) => return format_period(dt),
        other => other.to_string_value(),
    };

    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    if let Some(dt) = parse_date(text, order) {
        return format_period(&dt);
    }

    EMBEDDED_DATE
        .find(text)
        .and_then(|m| parse_date(m.as_str(), order))
        .map(|dt| format_period(&dt))
        .unwrap_or_default()
}

fn format_period(dt: &NaiveDateTime) -> String {
    dt.format("%Y%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(s: &str) -> String {
        extract_period(&CellValue::text(s), DateOrder::DayFirst)
    }

    #[test]
    fn test_extract_period_iso() {
        assert_eq!(period("2023-07-15"), "202307");
        assert_eq!(period("  2023/7/5  "), "202307");
        assert_eq!(period("2023-07-15 13:45:00"), "202307");
        assert_eq!(period("2023-07-15T13:45:00Z"), "202307");
    }

    #[test]
    fn test_extract_period_day_first() {
        assert_eq!(period("15/07/2023"), "202307");
        assert_eq!(period("03/04/2023"), "202304");
        assert_eq!(period("15-07-2023 08:00"), "202307");
    }

    #[test]
    fn test_extract_period_month_first_preference() {
        let ambiguous = CellValue::text("03/04/2023");
        assert_eq!(extract_period(&ambiguous, DateOrder::MonthFirst), "202303");

        // unambiguous dates parse under either preference
        let unambiguous = CellValue::text("15/07/2023");
        assert_eq!(extract_period(&unambiguous, DateOrder::MonthFirst), "202307");
    }

    #[test]
    fn test_extract_period_embedded() {
        assert_eq!(period("Invoice 2023-07-15 paid"), "202307");
        assert_eq!(period("paid on 1/2/2024 by card"), "202402");
    }

    #[test]
    fn test_extract_period_named_month() {
        assert_eq!(period("15 July 2023"), "202307");
        assert_eq!(period("July 15, 2023"), "202307");
    }

    #[test]
    fn test_extract_period_empty_or_missing() {
        assert_eq!(period(""), "");
        assert_eq!(period("   "), "");
        assert_eq!(period("no date here"), "");
        assert_eq!(extract_period(&CellValue::Empty, DateOrder::DayFirst), "");
        assert_eq!(extract_period(&CellValue::Integer(45123), DateOrder::DayFirst), "");
    }

    #[test]
    fn test_extract_period_from_date_value() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(extract_period(&CellValue::from(d), DateOrder::DayFirst), "202401");
    }
}
