//! # Reference Numbers
//!
//! Parsing of the owner's reference template and formatting of the next
//! number in the shared invoice/estimate sequence.
//!
//! ## Template Grammar
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Template segments are separated by "-":                               │
//! │                                                                         │
//! │   INV-001            prefix "INV", width 3                              │
//! │   INV-YYYY-0001      prefix "INV", year, width 4                        │
//! │   INV-2024-MM-001    prefix "INV", year (literal year works), month     │
//! │   Q-YY-01            prefix "Q", two-digit year, width 2                │
//! │                                                                         │
//! │  Output: prefix ["-" year] ["-" month] "-" zero_pad(n, width)           │
//! │          INV-2026-10-007                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The numeric suffix of an existing reference is its trailing run of
//! digits, so year and month segments never leak into the sequence.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Width used when a template carries no counter segment.
const DEFAULT_WIDTH: usize = 3;

/// How the year is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearMarker {
    Full,
    Short,
}

/// A parsed reference template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFormat {
    pub prefix: String,
    pub year: Option<YearMarker>,
    pub month: bool,
    pub width: usize,
}

impl ReferenceFormat {
    /// Parses a template such as `INV-001` or `INV-YYYY-MM-0001`.
    ///
    /// ## Example
    /// ```rust
    /// use billwise_core::reference::ReferenceFormat;
    ///
    /// let format = ReferenceFormat::parse("INV-001").unwrap();
    /// assert_eq!(format.prefix, "INV");
    /// assert_eq!(format.width, 3);
    /// ```
    pub fn parse(template: &str) -> CoreResult<Self> {
        let template = template.trim();
        if template.is_empty() {
            return Err(invalid(template, "template is empty"));
        }

        let segments: Vec<&str> = template.split('-').filter(|s| !s.is_empty()).collect();

        // The last all-digit segment is the counter
        let (counter_width, head) = match segments.split_last() {
            Some((last, head)) if is_digits(last) => (last.len(), head),
            _ => (DEFAULT_WIDTH, &segments[..]),
        };

        let mut prefix_parts: Vec<&str> = Vec::new();
        let mut year = None;
        let mut month = false;

        for segment in head {
            let upper = segment.to_uppercase();
            match upper.as_str() {
                "YYYY" => year = Some(YearMarker::Full),
                "YY" if year.is_none() => year = Some(YearMarker::Short),
                "MM" => month = true,
                _ if is_digits(segment) && segment.len() == 4 && year.is_none() => {
                    year = Some(YearMarker::Full)
                }
                _ if is_digits(segment) && segment.len() == 2 && year.is_some() && !month => {
                    month = true
                }
                _ if year.is_some() || month => {
                    return Err(invalid(
                        template,
                        "prefix text must come before the year and month markers",
                    ))
                }
                _ => prefix_parts.push(segment),
            }
        }

        let prefix = prefix_parts.join("-");
        if prefix.chars().any(|c| c.is_whitespace()) {
            return Err(invalid(template, "prefix cannot contain spaces"));
        }

        Ok(ReferenceFormat {
            prefix,
            year,
            month,
            width: counter_width.clamp(1, 12),
        })
    }

    /// Formats `number` for a document issued on `date`.
    pub fn format(&self, number: u64, date: NaiveDate) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(4);
        if !self.prefix.is_empty() {
            parts.push(self.prefix.clone());
        }
        match self.year {
            Some(YearMarker::Full) => parts.push(format!("{:04}", date.year())),
            Some(YearMarker::Short) => parts.push(format!("{:02}", date.year() % 100)),
            None => {}
        }
        if self.month {
            parts.push(format!("{:02}", date.month()));
        }
        parts.push(format!("{:0width$}", number, width = self.width));
        parts.join("-")
    }

    /// Prefix for the timestamp fallback; falls back to the kind's prefix.
    pub fn fallback_prefix<'a>(&'a self, default: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            default
        } else {
            &self.prefix
        }
    }
}

impl Default for ReferenceFormat {
    fn default() -> Self {
        ReferenceFormat {
            prefix: "INV".to_string(),
            year: None,
            month: false,
            width: DEFAULT_WIDTH,
        }
    }
}

fn invalid(template: &str, reason: &str) -> CoreError {
    CoreError::InvalidReferenceFormat {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

// =============================================================================
// Suffix helpers
// =============================================================================

/// Numeric value of the trailing digit run (`INV-2026-014` → 14).
pub fn numeric_suffix(reference: &str) -> Option<u64> {
    let trimmed = reference.trim_end();
    let digits: String = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<char>>()
        .into_iter()
        .rev()
        .collect();

    if digits.is_empty() {
        return None;
    }
    // Counters wider than u64 are not ours
    digits.parse().ok()
}

/// Highest numeric suffix among `references`, or 0 when none has one.
pub fn max_suffix<'a, I>(references: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    references
        .into_iter()
        .filter_map(numeric_suffix)
        .max()
        .unwrap_or(0)
}

/// Every digit of `reference`, in order (`EST-003` → `003`).
///
/// Used to tolerate prefix confusion: `EST-003` and `INV-003` share `003`.
pub fn digits_only(reference: &str) -> String {
    reference.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// True when both references carry the same digits and any digits at all.
pub fn digits_match(a: &str, b: &str) -> bool {
    let (da, db) = (digits_only(a), digits_only(b));
    if da.is_empty() || db.is_empty() {
        return false;
    }
    da == db || strip_leading_zeros(&da) == strip_leading_zeros(&db)
}

fn strip_leading_zeros(s: &str) -> &str {
    let stripped = s.trim_start_matches('0');
    if stripped.is_empty() {
        "0"
    } else {
        stripped
    }
}

/// Timestamp-suffixed reference used when sequencing fails.
///
/// ## Example
/// ```rust
/// use billwise_core::reference::timestamp_reference;
///
/// assert_eq!(timestamp_reference("INV", 1_760_000_123_456), "INV-123456");
/// ```
pub fn timestamp_reference(prefix: &str, epoch_millis: i64) -> String {
    format!("{}-{:06}", prefix, epoch_millis.rem_euclid(1_000_000))
}

/// Invoice number for a converted estimate: the estimate's own number.
#[inline]
pub fn same_reference(estimate_reference: &str) -> String {
    estimate_reference.to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_default_template() {
        let format = ReferenceFormat::parse("INV-001").unwrap();
        assert_eq!(format, ReferenceFormat::default());
        assert_eq!(format.format(1, date(2026, 1, 5)), "INV-001");
        assert_eq!(format.format(1234, date(2026, 1, 5)), "INV-1234");
    }

    #[test]
    fn test_parse_year_and_month_markers() {
        let format = ReferenceFormat::parse("INV-YYYY-MM-0001").unwrap();
        assert_eq!(format.year, Some(YearMarker::Full));
        assert!(format.month);
        assert_eq!(format.width, 4);
        assert_eq!(format.format(7, date(2026, 10, 18)), "INV-2026-10-0007");

        let literal = ReferenceFormat::parse("INV-2024-001").unwrap();
        assert_eq!(literal.year, Some(YearMarker::Full));
        assert_eq!(literal.format(12, date(2026, 3, 1)), "INV-2026-012");

        let short = ReferenceFormat::parse("Q-YY-01").unwrap();
        assert_eq!(short.format(3, date(2026, 3, 1)), "Q-26-03");
    }

    #[test]
    fn test_parse_without_counter_or_prefix() {
        let format = ReferenceFormat::parse("BILL").unwrap();
        assert_eq!(format.prefix, "BILL");
        assert_eq!(format.width, 3);

        let bare = ReferenceFormat::parse("0001").unwrap();
        assert_eq!(bare.prefix, "");
        assert_eq!(bare.format(5, date(2026, 1, 1)), "0005");
        assert_eq!(bare.fallback_prefix("EST"), "EST");
    }

    #[test]
    fn test_parse_rejects_bad_templates() {
        assert!(ReferenceFormat::parse("   ").is_err());
        assert!(ReferenceFormat::parse("YYYY-INV-001").is_err());
        assert!(ReferenceFormat::parse("MY INV-001").is_err());
    }

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(numeric_suffix("INV-014"), Some(14));
        assert_eq!(numeric_suffix("INV-2026-10-007"), Some(7));
        assert_eq!(numeric_suffix("EST-"), None);
        assert_eq!(numeric_suffix("draft"), None);
    }

    #[test]
    fn test_max_suffix_unions_inputs() {
        let invoices = ["INV-001", "INV-004"];
        let estimates = ["INV-005", "EST-002"];
        let max = max_suffix(invoices.iter().chain(estimates.iter()).copied());
        assert_eq!(max, 5);
        assert_eq!(max_suffix(std::iter::empty()), 0);
    }

    #[test]
    fn test_digits_match_tolerates_prefix_confusion() {
        assert!(digits_match("EST-003", "INV-003"));
        assert!(digits_match("3", "INV-003"));
        assert!(!digits_match("INV-004", "INV-003"));
        assert!(!digits_match("latest", "INV-003"));
    }

    #[test]
    fn test_timestamp_reference_keeps_six_digits() {
        assert_eq!(timestamp_reference("EST", 1_000_000_000_042), "EST-000042");
    }

    #[test]
    fn test_same_reference_is_identity() {
        assert_eq!(same_reference("INV-007"), "INV-007");
    }
}
