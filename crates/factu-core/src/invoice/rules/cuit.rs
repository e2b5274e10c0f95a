//! CUIT (Argentine tax identification number) extraction and validation.

use super::patterns::{CUIT_PATTERN, CUIT_STANDALONE};
use super::{ExtractionMatch, FieldExtractor};

/// CUIT field extractor.
pub struct CuitExtractor {
    validate: bool,
}

impl CuitExtractor {
    /// Create a new CUIT extractor.
    pub fn new() -> Self {
        Self { validate: true }
    }

    /// Set whether to drop CUITs with a bad check digit.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    fn accepts(&self, cuit: &str) -> bool {
        !self.validate || validate_cuit(cuit)
    }
}

impl Default for CuitExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CuitExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// Labeled CUITs first (document order), then bare dashed ones.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        for caps in CUIT_PATTERN.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let cuit = format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
            if self.accepts(&cuit) {
                results.push(
                    ExtractionMatch::new(cuit, 0.95, whole.as_str())
                        .with_position(whole.start(), whole.end()),
                );
            }
        }

        for caps in CUIT_STANDALONE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let cuit = format!("{}{}{}", &caps[1], &caps[2], &caps[3]);

            // Already found with the labeled pattern
            if results.iter().any(|r| r.value == cuit) {
                continue;
            }

            if self.accepts(&cuit) {
                results.push(
                    ExtractionMatch::new(cuit, 0.7, whole.as_str())
                        .with_position(whole.start(), whole.end()),
                );
            }
        }

        results
    }
}

/// Digits-only CUIT if `raw` holds exactly 11 digits.
pub fn normalize_cuit(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == 11).then_some(digits)
}

/// Validate a CUIT using the modulo-11 check digit.
///
/// Weights 5,4,3,2,7,6,5,4,3,2 over the first ten digits; the check digit is
/// `11 - sum % 11`, where 11 maps to 0 and 10 is never valid.
pub fn validate_cuit(cuit: &str) -> bool {
    let digits: Vec<u32> = cuit.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() != 11 || cuit.chars().filter(|c| c.is_ascii_digit()).count() != 11 {
        return false;
    }

    let weights = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];
    let sum: u32 = digits.iter().zip(weights.iter()).map(|(d, w)| d * w).sum();

    match 11 - sum % 11 {
        11 => digits[10] == 0,
        10 => false,
        check => digits[10] == check,
    }
}

/// Format a CUIT with dashes (XX-XXXXXXXX-X).
pub fn format_cuit(cuit: &str) -> String {
    match normalize_cuit(cuit) {
        Some(d) => format!("{}-{}-{}", &d[0..2], &d[2..10], &d[10..11]),
        None => cuit.to_string(),
    }
}
