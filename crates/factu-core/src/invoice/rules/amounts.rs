//! Amount parsing for Argentine (and foreign-formatted) invoices.
//!
//! Separator roles are inferred from digit grouping. This is a heuristic with
//! one known blind spot: a single separator followed by exactly three digits
//! (`0,500`) is read as a thousands group. Callers that cannot tolerate that
//! should flag the record for review rather than guess differently.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use super::patterns::{
    AMOUNT_TOKEN, CAE_NUMBER, CBU, COMPOSITE_NUMBER, CURRENCY_MARK, CUIT_PATTERN, CUIT_STANDALONE,
    DATE_DMY, DATE_YMD,
};
use super::{ExtractionMatch, FieldExtractor};

/// Identifiers (CUIT, CAE, CBU) are longer than any plausible amount.
const MAX_PLAIN_DIGITS: usize = 9;

/// Amount field extractor.
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// Every amount-shaped token outside dates and identifiers, in document order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let masked = mask_non_amounts(text);
        AMOUNT_TOKEN
            .find_iter(&masked)
            .filter_map(|m| {
                let mut start = m.start();
                // A dash glued to a word or number is a separator, not a sign.
                if m.as_str().starts_with('-')
                    && masked[..start].chars().next_back().is_some_and(char::is_alphanumeric)
                {
                    start += 1;
                }
                let token = &masked[start..m.end()];
                if is_identifier(token) {
                    return None;
                }
                let amount = normalize_number(token)?;
                // Grouped or decimal tokens are more trustworthy than bare integers.
                let confidence = if token.contains(['.', ',']) { 0.8 } else { 0.5 };
                Some(ExtractionMatch::new(amount, confidence, token).with_position(start, m.end()))
            })
            .collect()
    }
}

/// Parse a monetary value such as `$ 1.234.567,89` or `USD 1,234.56`.
///
/// Returns `None` when the input holds no parseable number.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let stripped = CURRENCY_MARK.replace_all(raw, "");
    let compact: String = stripped
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00a0}' && *c != '\u{202f}')
        .collect();
    let token = AMOUNT_TOKEN.find(&compact)?;
    normalize_number(token.as_str())
}

/// Pick the amount from a line, preferring the longest numeric token.
pub fn pick_amount(line: &str) -> Option<Decimal> {
    AmountExtractor::new()
        .extract_all(line)
        .into_iter()
        .max_by_key(|m| m.source.len())
        .map(|m| m.value)
}

/// Largest amount anywhere in the document.
pub fn max_amount(lines: &[String]) -> Option<Decimal> {
    let extractor = AmountExtractor::new();
    lines
        .iter()
        .flat_map(|line| extractor.extract_all(line))
        .map(|m| m.value)
        .max()
}

/// Round to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount the Argentine way: `1.234,56`.
pub fn format_amount(value: Decimal) -> String {
    let rounded = round_money(value);
    let text = format!("{:.2}", rounded.abs());
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{}{},{}", sign, grouped, fraction)
}

/// Blank out dates, tax ids, invoice numbers and CAE/CBU codes, keeping
/// byte offsets intact. Their digit runs would otherwise read as amounts.
fn mask_non_amounts(text: &str) -> String {
    [
        &*DATE_DMY,
        &*DATE_YMD,
        &*CUIT_PATTERN,
        &*CUIT_STANDALONE,
        &*COMPOSITE_NUMBER,
        &*CAE_NUMBER,
        &*CBU,
    ]
    .iter()
    .fold(text.to_string(), |masked, pattern| {
        pattern
            .replace_all(&masked, |caps: &regex::Captures| " ".repeat(caps[0].len()))
            .into_owned()
    })
}

fn is_identifier(token: &str) -> bool {
    let digits = token.trim_start_matches('-');
    digits.chars().all(|c| c.is_ascii_digit()) && digits.len() > MAX_PLAIN_DIGITS
}

/// Resolve separator roles in a bare numeric token and parse it.
fn normalize_number(token: &str) -> Option<Decimal> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let dots = body.matches('.').count();
    let commas = body.matches(',').count();

    let canonical = match (dots, commas) {
        (0, 0) => body.to_string(),
        (d, c) if d > 0 && c > 0 => {
            // The separator that appears last is the decimal one.
            let (decimal, thousands) = match (body.rfind('.'), body.rfind(',')) {
                (Some(dot), Some(comma)) if dot > comma => ('.', ','),
                _ => (',', '.'),
            };
            if body.matches(decimal).count() > 1 {
                return None;
            }
            body.replace(thousands, "").replace(decimal, ".")
        }
        (d, c) => {
            let sep = if d > 0 { '.' } else { ',' };
            resolve_single_separator(body, sep, d.max(c))?
        }
    };

    let value = Decimal::from_str(&canonical).ok()?;
    let value = if negative { -value } else { value };
    Some(round_money(value))
}

fn resolve_single_separator(body: &str, sep: char, count: usize) -> Option<String> {
    let groups: Vec<&str> = body.split(sep).collect();
    let last = groups.last()?;

    if count == 1 {
        // `1.234` is a thousands group; `12,5` / `12,50` / `0,12345` are decimals.
        return Some(if last.len() == 3 {
            groups.concat()
        } else {
            groups.join(".")
        });
    }

    let middle_ok = groups[1..groups.len() - 1].iter().all(|g| g.len() == 3);
    if !middle_ok {
        return None;
    }
    match last.len() {
        3 => Some(groups.concat()),
        1 | 2 => {
            let integer = groups[..groups.len() - 1].concat();
            Some(format!("{}.{}", integer, last))
        }
        _ => None,
    }
}
