//! Consistency validation and the needs-review decision.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::debug;

use crate::models::config::ExtractionConfig;
use crate::models::invoice::{InvoiceExtract, TaxLine};

use super::parser::pad_digits;
use super::rules::amounts::round_money;
use super::rules::cuit::validate_cuit;

/// Why a record was flagged.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewIssue {
    /// A required field is absent.
    MissingField(&'static str),
    /// The total is zero or negative.
    NonPositiveTotal,
    /// Confidence under the review threshold.
    LowConfidence(f32),
    /// `net + taxes` does not match the total.
    TotalMismatch { computed: Decimal, declared: Decimal },
    /// A tax id fails its check digit.
    InvalidTaxId(String),
    /// Amounts too large to add up.
    AmountOverflow,
}

impl fmt::Display for ReviewIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewIssue::MissingField(name) => write!(f, "missing {}", name),
            ReviewIssue::NonPositiveTotal => write!(f, "total is not positive"),
            ReviewIssue::LowConfidence(c) => write!(f, "confidence {:.2} below threshold", c),
            ReviewIssue::TotalMismatch { computed, declared } => {
                write!(f, "net + taxes = {} but total = {}", computed, declared)
            }
            ReviewIssue::InvalidTaxId(id) => write!(f, "tax id {} fails checksum", id),
            ReviewIssue::AmountOverflow => write!(f, "amounts overflow"),
        }
    }
}

/// Cross-checks a record and decides whether it needs human review.
#[derive(Debug, Clone)]
pub struct ReviewGate {
    review_threshold: f32,
    tolerance: Decimal,
    default_tax_rate: Decimal,
    default_tax_type: String,
    default_currency: String,
    backfill_taxes: bool,
    validate_tax_id: bool,
}

impl ReviewGate {
    pub fn new() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            review_threshold: config.review_threshold,
            tolerance: Decimal::from_f64(config.total_tolerance).unwrap_or(Decimal::ONE),
            default_tax_rate: Decimal::from_f64(config.default_tax_rate)
                .map(|r| r.round_dp(4))
                .unwrap_or(Decimal::new(21, 2)),
            default_tax_type: config.default_tax_type.clone(),
            default_currency: config.default_currency.clone(),
            backfill_taxes: config.backfill_taxes,
            validate_tax_id: config.validate_tax_id,
        }
    }

    /// Set the rate assumed when only the total is known.
    pub fn with_default_tax_rate(mut self, rate: Decimal) -> Self {
        self.default_tax_rate = rate;
        self
    }

    /// Enable or disable deriving net and tax from the total.
    pub fn with_backfill(mut self, enabled: bool) -> Self {
        self.backfill_taxes = enabled;
        self
    }

    /// Normalize the record and flag it when a rule fails.
    ///
    /// `needs_review` only ever turns on, and the result is a fixed point:
    /// validating it again changes nothing.
    pub fn validate(&self, mut record: InvoiceExtract) -> InvoiceExtract {
        self.normalize(&mut record);

        let issues = self.issues(&record);
        if !issues.is_empty() {
            debug!(
                "Flagging {} for review: {}",
                record.source_reference,
                issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
            );
            record.needs_review = true;
        }

        if self.backfill_taxes {
            self.backfill(&mut record);
        }
        record
    }

    /// Every rule the record currently fails, in rule order.
    pub fn issues(&self, record: &InvoiceExtract) -> Vec<ReviewIssue> {
        let mut issues = Vec::new();

        let required: [(&'static str, bool); 5] = [
            ("type_letter", record.type_letter.is_some()),
            ("point_of_sale", record.point_of_sale.is_some()),
            ("invoice_number", record.invoice_number.is_some()),
            ("total", record.amounts.total.is_some()),
            ("supplier_name", record.supplier.name.is_some()),
        ];
        issues.extend(
            required
                .into_iter()
                .filter(|(_, present)| !present)
                .map(|(name, _)| ReviewIssue::MissingField(name)),
        );
        if record.amounts.total.is_some_and(|t| t <= Decimal::ZERO) {
            issues.push(ReviewIssue::NonPositiveTotal);
        }

        if record.confidence < self.review_threshold {
            issues.push(ReviewIssue::LowConfidence(record.confidence));
        }

        // Backfilled lines are derived from the total and prove nothing.
        if !record.amounts.estimated {
            if let (Some(net), Some(total)) = (record.amounts.net, record.amounts.total) {
                if !record.amounts.taxes.is_empty() {
                    let computed = record.amounts.tax_sum().and_then(|taxes| net.checked_add(taxes));
                    match computed.and_then(|c| Some((c, c.checked_sub(total)?))) {
                        Some((computed, diff)) if diff.abs() > self.tolerance => {
                            issues.push(ReviewIssue::TotalMismatch {
                                computed,
                                declared: total,
                            });
                        }
                        Some(_) => {}
                        None => issues.push(ReviewIssue::AmountOverflow),
                    }
                }
            }
        }

        if self.validate_tax_id {
            for party in [&record.supplier, &record.customer] {
                if let Some(id) = &party.tax_id {
                    if !validate_cuit(id) {
                        issues.push(ReviewIssue::InvalidTaxId(id.clone()));
                    }
                }
            }
        }

        issues
    }

    /// Coerce values into canonical form, whatever the provider sent.
    fn normalize(&self, record: &mut InvoiceExtract) {
        record.confidence = if record.confidence.is_finite() {
            record.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        record.point_of_sale = record.point_of_sale.take().and_then(|p| pad_digits(&p, 4));
        record.invoice_number = record.invoice_number.take().and_then(|n| pad_digits(&n, 8));
        if record.type_letter.is_some() {
            record.doc_code = record.type_letter.map(|l| l.doc_code().to_string());
        }
        if let Some(id) = record.compose_document_id() {
            record.document_id = Some(id);
        }

        for party in [&mut record.supplier, &mut record.customer] {
            if let Some(id) = party.tax_id.take() {
                let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
                party.tax_id = (!digits.is_empty()).then_some(digits);
            }
        }

        let amounts = &mut record.amounts;
        amounts.net = amounts.net.map(round_money);
        amounts.total = amounts.total.map(round_money);
        for tax in &mut amounts.taxes {
            // Providers sometimes report 21 instead of 0.21.
            if tax.rate > Decimal::ONE {
                tax.rate /= Decimal::ONE_HUNDRED;
            }
            tax.amount = round_money(tax.amount);
        }
        let code = amounts.currency_code.trim().to_uppercase();
        amounts.currency_code = if code.is_empty() {
            self.default_currency.clone()
        } else {
            code
        };
    }

    /// Derive net and a single tax line from a bare total.
    fn backfill(&self, record: &mut InvoiceExtract) {
        let amounts = &mut record.amounts;
        let Some(total) = amounts.total else { return };
        if amounts.net.is_some() || !amounts.taxes.is_empty() || total <= Decimal::ZERO {
            return;
        }

        let Some(net) = Decimal::ONE
            .checked_add(self.default_tax_rate)
            .and_then(|divisor| total.checked_div(divisor))
            .map(round_money)
        else {
            return;
        };
        let Some(tax) = total.checked_sub(net) else { return };
        amounts.net = Some(net);
        amounts.taxes = vec![TaxLine::new(self.default_tax_type.clone(), self.default_tax_rate, tax)];
        amounts.estimated = true;
        debug!("Backfilled net {} at assumed rate {}", net, self.default_tax_rate);
    }
}

impl Default for ReviewGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::TypeLetter;
    use pretty_assertions::assert_eq;

    fn complete_record() -> InvoiceExtract {
        let mut record = InvoiceExtract::new("test.pdf");
        record.type_letter = Some(TypeLetter::A);
        record.point_of_sale = Some("3".into());
        record.invoice_number = Some("3526".into());
        record.supplier.name = Some("EMPRESA DEMO S.A.".into());
        record.supplier.tax_id = Some("30-71438582-4".into());
        record.amounts.net = Some(Decimal::new(37500000, 2));
        record.amounts.taxes = vec![TaxLine::new("IVA", Decimal::new(21, 2), Decimal::new(7875000, 2))];
        record.amounts.total = Some(Decimal::new(45375000, 2));
        record.confidence = 0.9;
        record
    }

    #[test]
    fn test_consistent_record_passes() {
        let record = ReviewGate::new().validate(complete_record());
        assert!(!record.needs_review);
        assert_eq!(record.point_of_sale.as_deref(), Some("0003"));
        assert_eq!(record.invoice_number.as_deref(), Some("00003526"));
        assert_eq!(record.document_id.as_deref(), Some("A-0003-00003526"));
        assert_eq!(record.supplier.tax_id.as_deref(), Some("30714385824"));
        assert!(!record.amounts.estimated);
    }

    #[test]
    fn test_total_mismatch_flags_review() {
        let mut record = complete_record();
        record.amounts.total = Some(Decimal::new(46000000, 2));
        let gate = ReviewGate::new();
        assert!(gate.issues(&record).iter().any(|i| matches!(i, ReviewIssue::TotalMismatch { .. })));
        assert!(gate.validate(record).needs_review);
    }

    #[test]
    fn test_overflowing_amounts_flag_review() {
        use crate::invoice::rules::amounts::parse_amount;

        let huge = parse_amount("50.000.000.000.000.000.000.000.000.000,00").unwrap();
        let mut record = complete_record();
        record.amounts.net = Some(huge);
        record.amounts.taxes = vec![TaxLine::new("IVA", Decimal::new(21, 2), huge)];
        record.amounts.total = Some(huge);

        let gate = ReviewGate::new();
        assert_eq!(gate.issues(&record), vec![ReviewIssue::AmountOverflow]);
        let validated = gate.validate(record);
        assert!(validated.needs_review);
        assert_eq!(validated.amounts.tax_sum(), Some(huge));
    }

    #[test]
    fn test_backfill_skipped_for_invalid_rate() {
        let mut record = InvoiceExtract::new("scan.jpg");
        record.amounts.total = Some(Decimal::new(121000, 2));
        let validated = ReviewGate::new()
            .with_default_tax_rate(-Decimal::ONE)
            .validate(record);
        assert_eq!(validated.amounts.net, None);
        assert!(!validated.amounts.estimated);
    }

    #[test]
    fn test_difference_within_tolerance_passes() {
        let mut record = complete_record();
        record.amounts.total = Some(Decimal::new(45375050, 2));
        assert!(!ReviewGate::new().validate(record).needs_review);
    }

    #[test]
    fn test_missing_fields_flag_review() {
        let mut record = complete_record();
        record.supplier.name = None;
        let gate = ReviewGate::new();
        assert_eq!(
            gate.issues(&record),
            vec![ReviewIssue::MissingField("supplier_name")]
        );
        assert!(gate.validate(record).needs_review);
    }

    #[test]
    fn test_non_positive_total_flags_review() {
        let mut record = complete_record();
        record.amounts.net = None;
        record.amounts.taxes.clear();
        record.amounts.total = Some(Decimal::ZERO);
        let validated = ReviewGate::new().validate(record);
        assert!(validated.needs_review);
        assert_eq!(validated.amounts.net, None);
    }

    #[test]
    fn test_low_confidence_alone_flags_review() {
        let mut record = complete_record();
        record.confidence = 0.5;
        assert_eq!(
            ReviewGate::new().issues(&record),
            vec![ReviewIssue::LowConfidence(0.5)]
        );
    }

    #[test]
    fn test_only_total_known_with_low_confidence() {
        let mut record = InvoiceExtract::new("scan.jpg");
        record.amounts.total = Some(Decimal::new(121000, 2));
        record.confidence = 0.5;
        let validated = ReviewGate::new().validate(record);
        assert!(validated.needs_review);
        assert!(validated.amounts.estimated);
        assert_eq!(validated.amounts.net, Some(Decimal::new(100000, 2)));
        assert_eq!(validated.amounts.taxes[0].amount, Decimal::new(21000, 2));
        assert_eq!(validated.amounts.taxes[0].kind, "IVA");
    }

    #[test]
    fn test_configurable_tax_rate() {
        let mut record = InvoiceExtract::new("scan.jpg");
        record.amounts.total = Some(Decimal::new(110500, 2));
        let validated = ReviewGate::new()
            .with_default_tax_rate(Decimal::new(105, 3))
            .validate(record);
        assert_eq!(validated.amounts.net, Some(Decimal::new(100000, 2)));
    }

    #[test]
    fn test_backfill_can_be_disabled() {
        let mut record = InvoiceExtract::new("scan.jpg");
        record.amounts.total = Some(Decimal::new(121000, 2));
        let validated = ReviewGate::new().with_backfill(false).validate(record);
        assert_eq!(validated.amounts.net, None);
        assert!(validated.amounts.taxes.is_empty());
    }

    #[test]
    fn test_invalid_cuit_flags_review() {
        let mut record = complete_record();
        record.customer.tax_id = Some("30714385825".into());
        assert!(ReviewGate::new().validate(record).needs_review);
    }

    #[test]
    fn test_rates_and_currency_normalized() {
        let mut record = complete_record();
        record.amounts.taxes[0].rate = Decimal::new(21, 0);
        record.amounts.currency_code = " ".into();
        let validated = ReviewGate::new().validate(record);
        assert_eq!(validated.amounts.taxes[0].rate, Decimal::new(21, 2));
        assert_eq!(validated.amounts.currency_code, "ARS");
    }

    #[test]
    fn test_validate_is_idempotent() {
        let gate = ReviewGate::new();
        let samples = {
            let mut only_total = InvoiceExtract::new("a");
            only_total.amounts.total = Some(Decimal::new(99999, 2));
            only_total.confidence = 0.95;

            let mut mismatch = complete_record();
            mismatch.amounts.total = Some(Decimal::new(1, 0));

            vec![complete_record(), only_total, mismatch, InvoiceExtract::exhausted("b")]
        };

        for record in samples {
            let once = gate.validate(record);
            let twice = gate.validate(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_review_flag_never_cleared() {
        let mut record = complete_record();
        record.needs_review = true;
        assert!(ReviewGate::new().validate(record).needs_review);
    }
}
