//! Offline stand-in used when no remote provider is available.
//!
//! Its records are always flagged for review and never report more than
//! [`MAX_CONFIDENCE`], so they cannot pass for a real extraction.

use async_trait::async_trait;

use super::{Provider, ProviderOutput};
use crate::document::Document;
use crate::error::ProviderError;
use crate::invoice::HeuristicExtractor;
use crate::models::config::{OfflineConfig, OfflineMode};
use crate::models::invoice::{InvoiceExtract, RolePreference};

/// Upper bound on the confidence of an offline record.
pub const MAX_CONFIDENCE: f32 = 0.5;

const SAMPLE_INVOICE: &str = "\
FACTURA A COD. 01
Punto de Venta: 0001 Comp. Nro: 00000123
Fecha de Emisión: 15/03/2024
Razón Social: PROVEEDOR EJEMPLO S.R.L.
CUIT: 20-12345678-6
Condición de venta: Contado
Importe Neto Gravado: $ 10.000,00
IVA 21%: $ 2.100,00
Importe Total: $ 12.100,00
CAE N°: 74123456789012
Fecha de Vto. de CAE: 25/03/2024
";

/// Simulated provider.
pub struct OfflineProvider {
    mode: OfflineMode,
    confidence: f32,
}

impl OfflineProvider {
    pub fn new(mode: OfflineMode) -> Self {
        Self {
            mode,
            confidence: 0.3,
        }
    }

    pub fn from_config(config: &OfflineConfig) -> Self {
        Self::new(config.mode).with_confidence(config.confidence)
    }

    /// Set the reported confidence, capped at [`MAX_CONFIDENCE`].
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, MAX_CONFIDENCE)
        } else {
            0.0
        };
        self
    }

    fn record(&self) -> InvoiceExtract {
        let mut record = match self.mode {
            OfflineMode::Placeholder => InvoiceExtract::default(),
            OfflineMode::Sample => HeuristicExtractor::new()
                .extract_from_text(SAMPLE_INVOICE, RolePreference::Issuer),
        };
        record.confidence = self.confidence;
        record.needs_review = true;
        record
    }
}

impl Default for OfflineProvider {
    fn default() -> Self {
        Self::new(OfflineMode::Placeholder)
    }
}

#[async_trait]
impl Provider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn accepts(&self, _document: &Document) -> bool {
        true
    }

    async fn extract(&self, _document: &Document) -> Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::Structured(Box::new(self.record())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::TypeLetter;

    async fn run(provider: &OfflineProvider) -> InvoiceExtract {
        match provider.extract(&Document::url("https://x/f.png")).await.unwrap() {
            ProviderOutput::Structured(record) => *record,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_placeholder_is_blank_and_flagged() {
        let record = run(&OfflineProvider::default()).await;
        assert!(record.is_blank());
        assert!(record.needs_review);
        assert_eq!(record.confidence, 0.3);
    }

    #[tokio::test]
    async fn test_sample_is_parsed_but_capped() {
        let provider = OfflineProvider::new(OfflineMode::Sample).with_confidence(0.99);
        let record = run(&provider).await;
        assert_eq!(record.type_letter, Some(TypeLetter::A));
        assert_eq!(record.document_id.as_deref(), Some("A-0001-00000123"));
        assert_eq!(record.confidence, MAX_CONFIDENCE);
        assert!(record.needs_review);
    }

    #[test]
    fn test_confidence_sanitized() {
        assert_eq!(OfflineProvider::default().with_confidence(-1.0).confidence, 0.0);
        assert_eq!(OfflineProvider::default().with_confidence(f32::NAN).confidence, 0.0);
    }
}
