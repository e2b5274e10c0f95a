//! Rule-based field extractors for Argentine invoices.

pub mod amounts;
pub mod cuit;
pub mod dates;
pub mod labels;
pub mod names;
pub mod patterns;
pub mod qr;

pub use amounts::{format_amount, max_amount, parse_amount, pick_amount, AmountExtractor};
pub use cuit::{format_cuit, normalize_cuit, validate_cuit, CuitExtractor};
pub use dates::{find_date, parse_date, DateExtractor};
pub use labels::{find_block, find_near, fold, split_lines};
pub use names::{looks_like_business_name, pick_name};
pub use qr::{decode_auth_qr, AuthQr};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Extraction context with confidence scores.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}
