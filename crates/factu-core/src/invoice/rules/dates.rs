//! Date extraction for Spanish-language invoices.

use chrono::NaiveDate;

use super::labels::fold;
use super::patterns::{DATE_DMY, DATE_VERBOSE, DATE_YMD};
use super::{ExtractionMatch, FieldExtractor};

/// Date field extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// All valid calendar dates, ordered by position.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for caps in DATE_DMY.captures_iter(text) {
            let (Some(whole), Some(year)) = (caps.get(0), expand_year(&caps[3])) else {
                continue;
            };
            if let Some(date) = ymd(year, &caps[2], &caps[1]) {
                results.push(
                    ExtractionMatch::new(date, 0.9, whole.as_str())
                        .with_position(whole.start(), whole.end()),
                );
            }
        }

        for caps in DATE_YMD.captures_iter(text) {
            let (Some(whole), Ok(year)) = (caps.get(0), caps[1].parse::<i32>()) else {
                continue;
            };
            if let Some(date) = ymd(year, &caps[2], &caps[3]) {
                results.push(
                    ExtractionMatch::new(date, 0.95, whole.as_str())
                        .with_position(whole.start(), whole.end()),
                );
            }
        }

        for caps in DATE_VERBOSE.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let Some(month) = month_number(&caps[2]) else {
                continue;
            };
            let date = caps[1]
                .parse::<u32>()
                .ok()
                .zip(caps[3].parse::<i32>().ok())
                .and_then(|(day, year)| NaiveDate::from_ymd_opt(year, month, day));
            if let Some(date) = date {
                results.push(
                    ExtractionMatch::new(date, 0.9, whole.as_str())
                        .with_position(whole.start(), whole.end()),
                );
            }
        }

        results.sort_by_key(|m| m.position.map(|(start, _)| start));
        results
    }
}

/// Parse a string that is exactly one date in a supported shape.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DateExtractor::new()
        .extract_all(trimmed)
        .into_iter()
        .find(|m| m.position == Some((0, trimmed.len())))
        .map(|m| m.value)
}

/// First date-shaped substring in `text`, in document order.
pub fn find_date(text: &str) -> Option<NaiveDate> {
    DateExtractor::new().extract(text).map(|m| m.value)
}

/// Two-digit years pivot at 50: `49` is 2049, `50` is 1950.
fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    Some(match raw.len() {
        2 if year < 50 => 2000 + year,
        2 => 1900 + year,
        _ => year,
    })
}

fn ymd(year: i32, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Spanish month names and common abbreviations, diacritic-insensitive.
fn month_number(name: &str) -> Option<u32> {
    let month = match fold(name).as_str() {
        "enero" | "ene" => 1,
        "febrero" | "feb" => 2,
        "marzo" | "mar" => 3,
        "abril" | "abr" => 4,
        "mayo" | "may" => 5,
        "junio" | "jun" => 6,
        "julio" | "jul" => 7,
        "agosto" | "ago" => 8,
        "septiembre" | "setiembre" | "sep" | "sept" | "set" => 9,
        "octubre" | "oct" => 10,
        "noviembre" | "nov" => 11,
        "diciembre" | "dic" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_numeric_forms() {
        assert_eq!(parse_date("01/08/2025"), date(2025, 8, 1));
        assert_eq!(parse_date("1-8-2025"), date(2025, 8, 1));
        assert_eq!(parse_date("2025-08-01"), date(2025, 8, 1));
        assert_eq!(parse_date("2025/08/01"), date(2025, 8, 1));
        assert_eq!(parse_date(" 15.08.2025 "), date(2025, 8, 15));
    }

    #[test]
    fn test_two_digit_year_pivot() {
        assert_eq!(parse_date("01/08/25"), date(2025, 8, 1));
        assert_eq!(parse_date("01/08/49"), date(2049, 8, 1));
        assert_eq!(parse_date("01/08/75"), date(1975, 8, 1));
    }

    #[test]
    fn test_verbose_form() {
        assert_eq!(parse_date("1 de agosto de 2025"), date(2025, 8, 1));
        assert_eq!(parse_date("15 de Setiembre de 2024"), date(2024, 9, 15));
        assert_eq!(parse_date("3 de FEBRERO 2024"), date(2024, 2, 3));
        assert_eq!(parse_date("3 de brumario de 2024"), None);
    }

    #[test]
    fn test_invalid_calendar_dates() {
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("31/04/2025"), None);
        assert_eq!(parse_date("29/02/2023"), None);
        assert_eq!(parse_date("29/02/2024"), date(2024, 2, 29));
        assert_eq!(parse_date("30 de febrero de 2024"), None);
    }

    #[test]
    fn test_parse_date_rejects_surrounding_text() {
        assert_eq!(parse_date("Fecha: 01/08/2025"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_round_trip_through_iso() {
        for (d, m, y) in [(1, 1, 2000), (28, 2, 2023), (31, 12, 1999), (15, 6, 2030)] {
            let dmy = format!("{:02}/{:02}/{}", d, m, y);
            let parsed = parse_date(&dmy).unwrap();
            assert_eq!(parse_date(&parsed.format("%Y-%m-%d").to_string()), Some(parsed));
        }
    }

    #[test]
    fn test_find_date_picks_first_in_document() {
        let text = "Vencimiento 15/08/2025\nEmitida el 1 de agosto de 2025";
        assert_eq!(find_date(text), date(2025, 8, 15));
        assert_eq!(find_date("sin fechas"), None);
    }
}
