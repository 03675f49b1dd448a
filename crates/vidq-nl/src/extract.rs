//! Entity extraction from lower-cased questions
//!
//! Dates ("28 ноября 2025", "с 1 по 5 ноября 2025", "28.11.2025", "2025-11-28"),
//! threshold phrases ("больше 100 000 просмотров") and creator ids ("id 123").

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use vidq_schema::SchemaDescriptor;

// ============================================================================
// Regex Patterns
// ============================================================================

static TEXT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bс\s+(\d{1,2})(?:\s+([а-я]+))?(?:\s+(\d{4}))?(?:\s+года?)?\s+по\s+(\d{1,2})\s+([а-я]+)(?:\s+(\d{4}))?",
    )
    .expect("Invalid regex")
});

static NUMERIC_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bс\s+(\d{1,2}\.\d{1,2}\.\d{4}|\d{4}-\d{2}-\d{2})\s+по\s+(\d{1,2}\.\d{1,2}\.\d{4}|\d{4}-\d{2}-\d{2})")
        .expect("Invalid regex")
});

static TEXT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s+([а-я]+)\s+(\d{4})").expect("Invalid regex"));

static DOTTED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b").expect("Invalid regex"));

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("Invalid regex"));

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:[\s_,.]\d+)*)").expect("Invalid regex"));

static CREATOR_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:id|айди)\b\s*[:=№]?\s*([0-9a-z_-]+)").expect("Invalid regex")
});

// ============================================================================
// Dates
// ============================================================================

/// A recognized date restriction, both bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    Day(NaiveDate),
    Range(NaiveDate, NaiveDate),
}

impl DateFilter {
    /// Render as a SQL predicate over `column`
    pub fn to_sql(&self, column: &str) -> String {
        match self {
            DateFilter::Day(day) => {
                format!("DATE({}) = '{}'", column, day.format("%Y-%m-%d"))
            }
            DateFilter::Range(start, end) => format!(
                "DATE({}) BETWEEN '{}' AND '{}'",
                column,
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
        }
    }

    /// Build a range, degrading to whichever bound parsed first
    fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        match (start, end) {
            (Some(start), Some(end)) if start <= end => Some(DateFilter::Range(start, end)),
            (Some(start), _) => Some(DateFilter::Day(start)),
            (None, Some(end)) => Some(DateFilter::Day(end)),
            (None, None) => None,
        }
    }
}

/// Find the date restriction in a lower-cased question
pub fn extract_date(text: &str, schema: &SchemaDescriptor) -> Option<DateFilter> {
    if let Some(caps) = TEXT_RANGE.captures(text) {
        let day_from = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let day_to = caps.get(4).and_then(|m| m.as_str().parse::<u32>().ok());
        let month_to = caps.get(5).and_then(|m| schema.month_for(m.as_str()));
        let month_from = match caps.get(2) {
            Some(word) => schema.month_for(word.as_str()),
            None => month_to,
        };
        let year_to = caps
            .get(6)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .or_else(|| caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok()));
        let year_from = match caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok()) {
            Some(year) => Some(year),
            // "с 28 декабря по 2 января 2026" starts in the previous year
            None => match (month_from, month_to, year_to) {
                (Some(from), Some(to), Some(year)) if from > to => Some(year - 1),
                _ => year_to,
            },
        };

        let start = ymd(year_from, month_from, day_from);
        let end = ymd(year_to, month_to, day_to);
        if let Some(filter) = DateFilter::from_bounds(start, end) {
            return Some(filter);
        }
    }

    if let Some(caps) = NUMERIC_RANGE.captures(text) {
        let start = parse_numeric_date(&caps[1]);
        let end = parse_numeric_date(&caps[2]);
        if let Some(filter) = DateFilter::from_bounds(start, end) {
            return Some(filter);
        }
    }

    // Single dates: earliest valid mention wins
    let mut found: Vec<(usize, NaiveDate)> = Vec::new();
    for caps in TEXT_DATE.captures_iter(text) {
        let day = caps[1].parse::<u32>().ok();
        let month = schema.month_for(&caps[2]);
        let year = caps[3].parse::<i32>().ok();
        if let Some(date) = ymd(year, month, day) {
            found.push((caps.get(0).map_or(0, |m| m.start()), date));
        }
    }
    for m in DOTTED_DATE.find_iter(text).chain(ISO_DATE.find_iter(text)) {
        if let Some(date) = parse_numeric_date(m.as_str()) {
            found.push((m.start(), date));
        }
    }

    found
        .into_iter()
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, date)| DateFilter::Day(date))
}

fn ymd(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year?, month?, day?)
}

/// Parse `DD.MM.YYYY` or `YYYY-MM-DD`
pub fn parse_numeric_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

// ============================================================================
// Thresholds
// ============================================================================

/// "больше 100 000 просмотров" → `views_count > 100000`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Threshold {
    pub operator: String,
    pub value: u64,
    /// Metric named right after the number, if any
    pub metric: Option<String>,
}

impl Threshold {
    pub fn to_sql(&self, default_metric: &str) -> String {
        let metric = self.metric.as_deref().unwrap_or(default_metric);
        format!("{}_count {} {}", metric, self.operator, self.value)
    }
}

/// Find the first comparison phrase followed by a number
pub fn extract_threshold(text: &str, schema: &SchemaDescriptor) -> Option<Threshold> {
    for comparison in &schema.comparisons {
        for (pos, _) in text.match_indices(comparison.phrase.as_str()) {
            let rest = &text[pos + comparison.phrase.len()..];
            let Some(caps) = LEADING_NUMBER.captures(rest) else {
                continue;
            };
            let literal = &caps[1];
            // Strip whitespace and thousand separators before parsing
            let digits: String = literal.chars().filter(|c| c.is_ascii_digit()).collect();
            let Ok(value) = digits.parse::<u64>() else {
                tracing::warn!(literal, "threshold literal out of range, ignoring");
                continue;
            };

            let after = &rest[caps.get(0).map_or(0, |m| m.end())..];
            let metric = after
                .split_whitespace()
                .next()
                .and_then(|word| schema.metric_in(word))
                .map(str::to_string);

            return Some(Threshold {
                operator: comparison.operator.clone(),
                value,
                metric,
            });
        }
    }
    None
}

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier following an "id" marker, case preserved
pub fn extract_creator_id(question: &str) -> Option<String> {
    CREATOR_ID
        .captures(question)
        .map(|caps| caps[1].trim_end_matches('-').to_string())
        .filter(|id| !id.is_empty())
}
