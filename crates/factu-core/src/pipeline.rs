//! Provider ladder: runs providers in priority order and keeps the most
//! confident record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{ProviderError, Result};
use crate::invoice::{HeuristicExtractor, ReviewGate};
use crate::models::config::FactuConfig;
use crate::models::invoice::{AuditLog, InvoiceExtract, RolePreference};
use crate::providers::{
    OcrSpaceProvider, OfflineProvider, Provider, ProviderOutput, TextProvider, VisionProvider,
};

/// When a rung is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    /// Run regardless of earlier results.
    Always,
    /// Run only while no result exists or the best confidence is below the
    /// threshold.
    Below(f32),
}

impl Gate {
    fn admits(&self, best: Option<f32>) -> bool {
        match (self, best) {
            (Gate::Always, _) | (_, None) => true,
            (Gate::Below(threshold), Some(confidence)) => confidence < *threshold,
        }
    }
}

/// One step of the ladder.
#[derive(Clone)]
pub struct Rung {
    pub provider: Arc<dyn Provider>,
    pub gate: Gate,
}

impl Rung {
    pub fn new(provider: impl Provider + 'static, gate: Gate) -> Self {
        Self {
            provider: Arc::new(provider),
            gate,
        }
    }
}

/// Outcome of one provider call.
#[derive(Debug)]
enum Attempt {
    Succeeded {
        provider: String,
        record: InvoiceExtract,
        elapsed: Duration,
    },
    Failed {
        provider: String,
        error: ProviderError,
        elapsed: Duration,
    },
}

/// Extraction orchestrator.
///
/// A call never fails: provider faults end up in the audit trail and a
/// total failure yields an empty record flagged for review.
pub struct Pipeline {
    rungs: Vec<Rung>,
    heuristic: HeuristicExtractor,
    review: ReviewGate,
    timeout: Duration,
    role: RolePreference,
}

impl Pipeline {
    /// Pipeline without providers.
    pub fn new(config: &FactuConfig) -> Self {
        Self {
            rungs: Vec::new(),
            heuristic: HeuristicExtractor::from_config(&config.extraction),
            review: ReviewGate::from_config(&config.extraction),
            timeout: Duration::from_secs(config.providers.timeout_secs),
            role: config.extraction.role_preference,
        }
    }

    /// Pipeline with the built-in ladder: text, vision, OCR.space, offline.
    pub fn from_config(config: &FactuConfig) -> Result<Self> {
        let providers = &config.providers;
        let extraction = &config.extraction;
        let timeout = Duration::from_secs(providers.timeout_secs);

        let mut pipeline = Self::new(config).with_rung(Rung::new(TextProvider::new(), Gate::Always));

        if providers.vision.enabled {
            let vision = VisionProvider::from_config(&providers.vision, timeout)?;
            pipeline = pipeline.with_rung(Rung::new(vision, Gate::Always));
        }
        if providers.ocr_space.enabled {
            let ocr = OcrSpaceProvider::from_config(&providers.ocr_space, timeout)?;
            pipeline = pipeline.with_rung(Rung::new(ocr, Gate::Below(extraction.accept_threshold)));
        }
        if providers.offline.enabled {
            let offline = OfflineProvider::from_config(&providers.offline);
            pipeline =
                pipeline.with_rung(Rung::new(offline, Gate::Below(extraction.fallback_threshold)));
        }

        debug!(
            "Provider ladder: {}",
            pipeline
                .rungs
                .iter()
                .map(|r| r.provider.name())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(pipeline)
    }

    /// Append a rung to the ladder.
    pub fn with_rung(mut self, rung: Rung) -> Self {
        self.rungs.push(rung);
        self
    }

    /// Set the per-provider time bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default role preference.
    pub fn with_role(mut self, role: RolePreference) -> Self {
        self.role = role;
        self
    }

    /// Names of the providers in ladder order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.rungs.iter().map(|r| r.provider.name()).collect()
    }

    /// Extract with the configured role preference.
    pub async fn extract(&self, document: &Document) -> InvoiceExtract {
        self.extract_with_role(document, self.role).await
    }

    pub async fn extract_with_role(
        &self,
        document: &Document,
        role: RolePreference,
    ) -> InvoiceExtract {
        let reference = document.reference();
        info!("Extracting invoice from {}", reference);

        let mut audit = AuditLog::default();
        let mut best: Option<(String, InvoiceExtract)> = None;

        for rung in &self.rungs {
            let provider = rung.provider.as_ref();
            if !rung.gate.admits(best.as_ref().map(|(_, r)| r.confidence)) {
                debug!("Skipping {}: current result is good enough", provider.name());
                continue;
            }
            if !provider.accepts(document) {
                debug!("Skipping {}: does not accept {}", provider.name(), reference);
                continue;
            }

            match self.attempt(provider, document, role).await {
                Attempt::Succeeded {
                    provider,
                    record,
                    elapsed,
                } => {
                    debug!(
                        "{} finished in {}ms with confidence {:.2}",
                        provider,
                        elapsed.as_millis(),
                        record.confidence
                    );
                    audit.providers_used.push(provider.clone());
                    audit.processing_times.insert(provider.clone(), elapsed.as_millis() as u64);

                    let better = best
                        .as_ref()
                        .is_none_or(|(_, current)| record.confidence > current.confidence);
                    if better {
                        best = Some((provider, record));
                    }
                }
                Attempt::Failed {
                    provider,
                    error,
                    elapsed,
                } => {
                    warn!("{} failed after {}ms: {}", provider, elapsed.as_millis(), error);
                    audit.providers_used.push(provider.clone());
                    audit.processing_times.insert(provider.clone(), elapsed.as_millis() as u64);
                    audit.error_logs.push(format!("{}: {}", provider, error));
                }
            }
        }

        let mut record = match best {
            Some((provider, record)) => {
                audit.final_provider = Some(provider);
                record
            }
            None => {
                warn!("All providers failed for {}", reference);
                if audit.providers_used.is_empty() {
                    audit.error_logs.push(format!("no provider accepts {}", reference));
                }
                InvoiceExtract::exhausted(&reference)
            }
        };
        record.source_reference = reference;
        record.audit = audit;

        let record = self.review.validate(record);
        info!(
            "Extraction finished: provider={} confidence={:.2} needs_review={}",
            record.audit.final_provider.as_deref().unwrap_or("none"),
            record.confidence,
            record.needs_review
        );
        record
    }

    async fn attempt(
        &self,
        provider: &dyn Provider,
        document: &Document,
        role: RolePreference,
    ) -> Attempt {
        let name = provider.name().to_string();
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, provider.extract(document)).await;
        let elapsed = started.elapsed();

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                return Attempt::Failed {
                    provider: name,
                    error,
                    elapsed,
                };
            }
            Err(_) => {
                return Attempt::Failed {
                    error: ProviderError::Timeout {
                        provider: name.clone(),
                        secs: self.timeout.as_secs(),
                    },
                    provider: name,
                    elapsed,
                };
            }
        };

        let record = match output {
            ProviderOutput::PlainText(text) => self.heuristic.extract_from_text(&text, role),
            ProviderOutput::Structured(record) => {
                let mut record = *record;
                // Structured providers report the issuer as supplier
                if role == RolePreference::Recipient {
                    std::mem::swap(&mut record.supplier, &mut record.customer);
                }
                record
            }
        };

        Attempt::Succeeded {
            provider: name,
            record,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::models::invoice::{Party, TypeLetter};

    /// Provider returning a fixed outcome.
    struct Scripted {
        name: &'static str,
        outcome: fn() -> std::result::Result<ProviderOutput, ProviderError>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            outcome: fn() -> std::result::Result<ProviderOutput, ProviderError>,
        ) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    outcome,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn accepts(&self, _document: &Document) -> bool {
            true
        }

        async fn extract(
            &self,
            _document: &Document,
        ) -> std::result::Result<ProviderOutput, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    struct Stalled;

    #[async_trait]
    impl Provider for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        fn accepts(&self, _document: &Document) -> bool {
            true
        }

        async fn extract(
            &self,
            _document: &Document,
        ) -> std::result::Result<ProviderOutput, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ProviderError::NoText("stalled".to_string()))
        }
    }

    fn complete_record(confidence: f32) -> InvoiceExtract {
        let mut record = InvoiceExtract::default();
        record.type_letter = Some(TypeLetter::A);
        record.point_of_sale = Some("0003".to_string());
        record.invoice_number = Some("00003526".to_string());
        record.supplier = Party {
            name: Some("ACME SERVICES S.A.".to_string()),
            tax_id: None,
        };
        record.amounts.net = Some(Decimal::new(37500000, 2));
        record.amounts.taxes = vec![crate::models::invoice::TaxLine::new(
            "IVA",
            Decimal::new(21, 2),
            Decimal::new(7875000, 2),
        )];
        record.amounts.total = Some(Decimal::new(45375000, 2));
        record.confidence = confidence;
        record
    }

    fn failing() -> std::result::Result<ProviderOutput, ProviderError> {
        Err(ProviderError::NotConfigured("vision".to_string()))
    }

    fn confident() -> std::result::Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::Structured(Box::new(complete_record(0.85))))
    }

    fn weak() -> std::result::Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::Structured(Box::new(complete_record(0.5))))
    }

    fn text_only() -> std::result::Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::PlainText("FACTURA A\nImporte Total: $ 100,00".to_string()))
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(&FactuConfig::default())
    }

    fn doc() -> Document {
        Document::url("https://example.com/factura.png")
    }

    #[tokio::test]
    async fn test_fallback_after_failure_keeps_second_provider() {
        let (first, _) = Scripted::new("vision", failing);
        let (second, _) = Scripted::new("ocr_space", confident);
        let p = pipeline()
            .with_rung(Rung::new(first, Gate::Always))
            .with_rung(Rung::new(second, Gate::Below(0.8)));

        let record = p.extract(&doc()).await;

        assert_eq!(record.audit.final_provider.as_deref(), Some("ocr_space"));
        assert_eq!(record.audit.providers_used, vec!["vision", "ocr_space"]);
        assert_eq!(record.audit.error_logs.len(), 1);
        assert!(record.audit.error_logs[0].starts_with("vision:"));
        // The fallback itself does not flag the record
        assert!(!record.needs_review);
        assert_eq!(record.source_reference, "https://example.com/factura.png");
    }

    #[tokio::test]
    async fn test_confident_result_short_circuits() {
        let (first, _) = Scripted::new("vision", confident);
        let (second, calls) = Scripted::new("ocr_space", weak);
        let p = pipeline()
            .with_rung(Rung::new(first, Gate::Always))
            .with_rung(Rung::new(second, Gate::Below(0.8)));

        let record = p.extract(&doc()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(record.audit.final_provider.as_deref(), Some("vision"));
    }

    #[tokio::test]
    async fn test_higher_confidence_wins() {
        let (first, _) = Scripted::new("vision", weak);
        let (second, _) = Scripted::new("ocr_space", confident);
        let (third, offline_calls) = Scripted::new("offline", weak);
        let p = pipeline()
            .with_rung(Rung::new(first, Gate::Always))
            .with_rung(Rung::new(second, Gate::Below(0.8)))
            .with_rung(Rung::new(third, Gate::Below(0.6)));

        let record = p.extract(&doc()).await;

        assert_eq!(record.audit.final_provider.as_deref(), Some("ocr_space"));
        assert_eq!(offline_calls.load(Ordering::SeqCst), 0);
        assert!((record.confidence - 0.85).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_text_result_replaces_weaker_record() {
        let (first, _) = Scripted::new("vision", weak);
        let (second, _) = Scripted::new("ocr_space", text_only);
        let p = pipeline()
            .with_rung(Rung::new(first, Gate::Always))
            .with_rung(Rung::new(second, Gate::Below(0.8)));

        let record = p.extract(&doc()).await;

        // Two critical fields from text give 0.55, above 0.5
        assert_eq!(record.audit.final_provider.as_deref(), Some("ocr_space"));
        assert!(record.needs_review);
    }

    #[tokio::test]
    async fn test_exhaustion_yields_flagged_empty_record() {
        let (first, _) = Scripted::new("vision", failing);
        let (second, _) = Scripted::new("ocr_space", failing);
        let p = pipeline()
            .with_rung(Rung::new(first, Gate::Always))
            .with_rung(Rung::new(second, Gate::Below(0.8)));

        let record = p.extract(&doc()).await;

        assert_eq!(record.confidence, 0.0);
        assert!(record.needs_review);
        assert!(record.is_blank());
        assert_eq!(record.audit.final_provider, None);
        assert_eq!(record.audit.error_logs.len(), 2);
    }

    #[tokio::test]
    async fn test_no_accepting_provider() {
        let p = pipeline().with_rung(Rung::new(TextProvider::new(), Gate::Always));

        let record = p.extract(&doc()).await;

        assert!(record.needs_review);
        assert!(record.audit.providers_used.is_empty());
        assert_eq!(record.audit.error_logs.len(), 1);
    }

    #[tokio::test]
    async fn test_text_document_goes_through_heuristic() {
        let p = pipeline().with_rung(Rung::new(TextProvider::new(), Gate::Always));
        let text = "FACTURA A\nPunto de Venta: 0003 Comp. Nro: 00003526\nImporte Total: $ 1.210,00";

        let record = p.extract(&Document::text(text, "memo.txt")).await;

        assert_eq!(record.audit.final_provider.as_deref(), Some("text"));
        assert_eq!(record.document_id.as_deref(), Some("A-0003-00003526"));
        assert_eq!(record.source_reference, "memo.txt");
    }

    #[tokio::test]
    async fn test_timeout_is_recorded() {
        let p = pipeline()
            .with_timeout(Duration::from_millis(20))
            .with_rung(Rung::new(Stalled, Gate::Always));

        let record = p.extract(&doc()).await;

        assert!(record.needs_review);
        assert_eq!(record.audit.providers_used, vec!["stalled"]);
        assert!(record.audit.error_logs[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_recipient_role_swaps_structured_parties() {
        fn with_customer() -> std::result::Result<ProviderOutput, ProviderError> {
            let mut record = complete_record(0.9);
            record.customer.name = Some("CLIENTE FINAL S.R.L.".to_string());
            Ok(ProviderOutput::Structured(Box::new(record)))
        }
        let (provider, _) = Scripted::new("vision", with_customer);
        let p = pipeline().with_rung(Rung::new(provider, Gate::Always));

        let record = p.extract_with_role(&doc(), RolePreference::Recipient).await;

        assert_eq!(record.supplier.name.as_deref(), Some("CLIENTE FINAL S.R.L."));
        assert_eq!(record.customer.name.as_deref(), Some("ACME SERVICES S.A."));
    }

    #[test]
    fn test_default_ladder_order() {
        let mut config = FactuConfig::default();
        config.providers.offline.enabled = true;
        let p = Pipeline::from_config(&config).unwrap();
        assert_eq!(p.provider_names(), vec!["text", "vision", "ocr_space", "offline"]);

        config.providers.vision.enabled = false;
        config.providers.ocr_space.enabled = false;
        let p = Pipeline::from_config(&config).unwrap();
        assert_eq!(p.provider_names(), vec!["text", "offline"]);
    }

    #[test]
    fn test_gate_admits() {
        assert!(Gate::Always.admits(Some(0.99)));
        assert!(Gate::Below(0.8).admits(None));
        assert!(Gate::Below(0.8).admits(Some(0.79)));
        assert!(!Gate::Below(0.8).admits(Some(0.8)));
    }
}
