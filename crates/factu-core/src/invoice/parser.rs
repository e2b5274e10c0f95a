//! Heuristic invoice extractor working on plain text.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::models::config::ExtractionConfig;
use crate::models::invoice::*;

use super::rules::{
    amounts::{max_amount, parse_amount, pick_amount},
    cuit::CuitExtractor,
    dates::{find_date, parse_date},
    labels::{self, find_near, has_label, split_lines},
    names::{find_name, header_name, pick_name},
    patterns::*,
    qr::{decode_auth_qr, AuthQr},
    FieldExtractor,
};

/// Text-only extractor composing the rule modules.
#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    default_currency: String,
    date_lookahead: usize,
    amount_lookahead: usize,
    name_lookahead: usize,
    header_lines: usize,
}

impl HeuristicExtractor {
    /// Create a new extractor with default settings.
    pub fn new() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            default_currency: config.default_currency.clone(),
            date_lookahead: config.date_lookahead,
            amount_lookahead: config.amount_lookahead,
            name_lookahead: config.name_lookahead,
            header_lines: config.header_lines,
        }
    }

    /// Best-effort record from OCR'd text. Never fails; empty text yields
    /// an all-null record with zero confidence.
    pub fn extract_from_text(&self, text: &str, role: RolePreference) -> InvoiceExtract {
        info!("Extracting invoice fields from {} characters of text", text.len());

        let mut record = InvoiceExtract::default();
        record.amounts.currency_code = self.default_currency.clone();

        // The QR payload is base64 noise to every other rule.
        let body = AFIP_QR.replace_all(text, " ");
        let lines = split_lines(&body);
        if lines.is_empty() {
            debug!("No text lines, returning empty record");
            return record;
        }

        self.extract_numbering(&body, &mut record);
        self.extract_dates(&body, &lines, &mut record);
        let currency_detected = self.extract_amounts(&body, &lines, &mut record);
        self.extract_parties(&body, &lines, role, &mut record);
        self.extract_misc(&body, &mut record);

        if let Some(qr) = decode_auth_qr(text) {
            debug!("Applying AFIP QR overrides");
            apply_qr(&mut record, qr, role, currency_detected);
        }

        record.doc_code = record.type_letter.map(|l| l.doc_code().to_string());
        record.document_id = record.compose_document_id();
        record.confidence = heuristic_confidence(&record);

        debug!(
            "Recovered critical fields {:?}, confidence {:.2}",
            record.recovered_critical_fields(),
            record.confidence
        );
        record
    }

    fn extract_numbering(&self, text: &str, record: &mut InvoiceExtract) {
        record.type_letter = TYPE_LETTER_AFTER
            .captures(text)
            .or_else(|| TYPE_LETTER_BEFORE.captures(text))
            .and_then(|c| TypeLetter::parse(&c[1]))
            .or_else(|| {
                DOC_CODE
                    .captures(text)
                    .and_then(|c| c[1].parse::<u32>().ok())
                    .and_then(TypeLetter::from_doc_code)
            });

        let (pos, number) = match POS_AND_NUMBER.captures(text) {
            Some(c) => (Some(c[1].to_string()), Some(c[2].to_string())),
            None => {
                // `Comprobante Nro: 0001-00001234` carries both parts.
                let labeled = INVOICE_NUMBER.captures(text);
                let pos = POINT_OF_SALE
                    .captures(text)
                    .map(|c| c[1].to_string())
                    .or_else(|| {
                        labeled
                            .as_ref()
                            .and_then(|c| c.get(1))
                            .map(|m| m.as_str().to_string())
                    });
                (pos, labeled.map(|c| c[2].to_string()))
            }
        };
        let (pos, number) = match (pos, number) {
            (None, None) => COMPOSITE_NUMBER
                .captures(text)
                .map(|c| (Some(c[1].to_string()), Some(c[2].to_string())))
                .unwrap_or((None, None)),
            other => other,
        };

        record.point_of_sale = pos.and_then(|p| pad_digits(&p, 4));
        record.invoice_number = number.and_then(|n| pad_digits(&n, 8));
    }

    fn extract_dates(&self, text: &str, lines: &[String], record: &mut InvoiceExtract) {
        // Due-date and CAE captions also start with "Fecha".
        let issue_lines: Vec<String> = lines
            .iter()
            .filter(|l| !has_label(l, labels::DUE_DATE_LABELS) && !has_label(l, &["cae"]))
            .cloned()
            .collect();
        record.issue_date = find_near(
            &issue_lines,
            labels::ISSUE_DATE_LABELS,
            self.date_lookahead,
            find_date,
        )
        .or_else(|| lines.iter().find_map(|l| find_date(l)));

        let due_lines: Vec<String> = lines
            .iter()
            .filter(|l| !has_label(l, &["cae"]))
            .cloned()
            .collect();
        record.due_date = PAYMENT_DUE
            .captures(text)
            .and_then(|c| parse_date(&c[1]))
            .or_else(|| {
                find_near(&due_lines, labels::DUE_DATE_LABELS, self.date_lookahead, find_date)
            });

        if let Some(c) = SERVICE_PERIOD.captures(text) {
            record.service_period.from = parse_date(&c[1]);
            record.service_period.to = parse_date(&c[2]);
        }

        if let Some(c) = CAE_NUMBER.captures(text) {
            record.authorization.number = Some(c[1].to_string());
        }
        record.authorization.due_date = CAE_DUE.captures(text).and_then(|c| parse_date(&c[1]));
    }

    /// Returns whether the currency was stated in the document.
    fn extract_amounts(&self, text: &str, lines: &[String], record: &mut InvoiceExtract) -> bool {
        let total_lines: Vec<String> = lines
            .iter()
            .filter(|l| !has_label(l, &["subtotal"]))
            .cloned()
            .collect();
        record.amounts.total =
            find_near(&total_lines, labels::TOTAL_LABELS, self.amount_lookahead, pick_amount)
                .or_else(|| max_amount(lines));

        record.amounts.net = NET_AMOUNT.captures(text).and_then(|c| parse_amount(&c[1]));

        let hundred = Decimal::ONE_HUNDRED;
        record.amounts.taxes = TAX_LINE
            .captures_iter(text)
            .filter_map(|c| {
                let rate = parse_amount(&c[1])? / hundred;
                let amount = parse_amount(&c[2])?;
                (amount > Decimal::ZERO).then(|| TaxLine::new("IVA", rate, amount))
            })
            .collect();

        let currency = if CURRENCY_USD.is_match(text) {
            Some("USD")
        } else if CURRENCY_EUR.is_match(text) {
            Some("EUR")
        } else {
            None
        };
        if let Some(code) = currency {
            record.amounts.currency_code = code.to_string();
        }
        currency.is_some()
    }

    fn extract_parties(
        &self,
        text: &str,
        lines: &[String],
        role: RolePreference,
        record: &mut InvoiceExtract,
    ) {
        let (labels, anchors, other_anchors) = match role {
            RolePreference::Issuer => (
                labels::ISSUER_NAME_LABELS,
                labels::ISSUER_BLOCK_ANCHORS,
                labels::RECIPIENT_BLOCK_ANCHORS,
            ),
            RolePreference::Recipient => (
                labels::RECIPIENT_NAME_LABELS,
                labels::RECIPIENT_BLOCK_ANCHORS,
                labels::ISSUER_BLOCK_ANCHORS,
            ),
        };

        record.supplier.name = find_name(lines, labels, anchors, self.name_lookahead)
            .or_else(|| header_name(lines, self.header_lines));

        record.customer.name = labels::find_block(lines, other_anchors, 6)
            .and_then(|block| block.iter().find_map(|l| pick_name(l)))
            .filter(|name| Some(name) != record.supplier.name.as_ref());

        let cuits: Vec<String> = CuitExtractor::new()
            .with_validation(false)
            .extract_all(text)
            .into_iter()
            .map(|m| m.value)
            .collect();
        let issuer_cuit = cuits.first().cloned();
        let recipient_cuit = cuits.get(1).cloned();
        let (preferred, other) = match role {
            RolePreference::Issuer => (issuer_cuit, recipient_cuit),
            RolePreference::Recipient => (recipient_cuit, issuer_cuit),
        };
        record.supplier.tax_id = preferred;
        record.customer.tax_id = other;
    }

    fn extract_misc(&self, text: &str, record: &mut InvoiceExtract) {
        record.payment_terms = PAYMENT_TERMS
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty());
        record.bank.cbu = CBU.captures(text).map(|c| c[1].to_string());
        record.bank.bank_name = BANK_NAME.captures(text).map(|c| c[1].trim().to_string());
        record.bank.branch = BRANCH.captures(text).map(|c| c[1].trim().to_string());
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Fill gaps from the QR payload without overwriting what the text gave,
/// except a non-positive total.
fn apply_qr(record: &mut InvoiceExtract, qr: AuthQr, role: RolePreference, currency_detected: bool) {
    if record.issue_date.is_none() {
        record.issue_date = qr.issue_date;
    }
    if record.amounts.total.is_none_or(|t| t <= Decimal::ZERO) && qr.total.is_some() {
        record.amounts.total = qr.total;
    }

    let issuer = match role {
        RolePreference::Issuer => &mut record.supplier,
        RolePreference::Recipient => &mut record.customer,
    };
    if issuer.tax_id.is_none() {
        issuer.tax_id = qr.tax_id;
    }

    if record.point_of_sale.is_none() {
        record.point_of_sale = qr.point_of_sale;
    }
    if record.invoice_number.is_none() {
        record.invoice_number = qr.invoice_number;
    }
    if record.type_letter.is_none() {
        record.type_letter = qr.type_letter;
    }
    if !currency_detected {
        if let Some(code) = qr.currency_code {
            record.amounts.currency_code = code;
        }
    }
    if record.authorization.number.is_none() {
        record.authorization.number = qr.authorization_number;
    }
}

/// Zero-pad a numeric identifier to exactly `width` digits.
///
/// Returns `None` for non-numeric input or a value that does not fit.
pub fn pad_digits(raw: &str, width: usize) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let value: u64 = digits.parse().ok()?;
    let padded = format!("{:0width$}", value, width = width);
    (padded.len() == width).then_some(padded)
}

/// 0 with nothing recovered, else `0.35 + 0.1` per critical field, capped
/// at 0.95.
fn heuristic_confidence(record: &InvoiceExtract) -> f32 {
    match record.recovered_critical_fields().len() {
        0 => 0.0,
        n => ((35 + 10 * n) as f32 / 100.0).min(0.95),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "
        FACTURA A COD. 01
        Punto de Venta: 0003 Comp. Nro: 00003526
        Fecha de Emisión: 01/08/2025
        Razón Social: EMPRESA DEMO S.A.
        CUIT: 30714385824
        Período Facturado Desde: 01/08/2025 Hasta: 31/08/2025
        Fecha de Vto. para el pago: 15/08/2025
        SERVICIOS PROFESIONALES
        Importe Neto Gravado: $ 375.000,00
        IVA 21%: $ 78.750,00
        Importe Total: $ 453.750,00
        CAE N°: 75314579648345
        Fecha de Vto. de CAE: 11/08/2025
    ";

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_empty_text_yields_blank_record() {
        let record = HeuristicExtractor::new().extract_from_text("", RolePreference::Issuer);
        assert!(record.is_blank());
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.document_id, None);

        let record = HeuristicExtractor::new().extract_from_text("   \n\t\n", RolePreference::Issuer);
        assert!(record.is_blank());
    }

    #[test]
    fn test_sample_invoice() {
        let record = HeuristicExtractor::new().extract_from_text(SAMPLE, RolePreference::Issuer);

        assert_eq!(record.type_letter, Some(TypeLetter::A));
        assert_eq!(record.doc_code.as_deref(), Some("01"));
        assert_eq!(record.point_of_sale.as_deref(), Some("0003"));
        assert_eq!(record.invoice_number.as_deref(), Some("00003526"));
        assert_eq!(record.document_id.as_deref(), Some("A-0003-00003526"));
        assert_eq!(record.issue_date, date(2025, 8, 1));
        assert_eq!(record.due_date, date(2025, 8, 15));
        assert_eq!(record.service_period.from, date(2025, 8, 1));
        assert_eq!(record.service_period.to, date(2025, 8, 31));
        assert_eq!(record.supplier.name.as_deref(), Some("EMPRESA DEMO S.A."));
        assert_eq!(record.supplier.tax_id.as_deref(), Some("30714385824"));
        assert_eq!(record.amounts.net, Some(Decimal::new(37500000, 2)));
        assert_eq!(
            record.amounts.taxes,
            vec![TaxLine::new("IVA", Decimal::new(21, 2), Decimal::new(7875000, 2))]
        );
        assert_eq!(record.amounts.total, Some(Decimal::new(45375000, 2)));
        assert_eq!(record.amounts.currency_code, "ARS");
        assert_eq!(record.authorization.number.as_deref(), Some("75314579648345"));
        assert_eq!(record.authorization.due_date, date(2025, 8, 11));
        assert_eq!(record.confidence, 0.95);
    }

    #[test]
    fn test_confidence_grows_with_fields() {
        let extractor = HeuristicExtractor::new();
        let one = extractor.extract_from_text("Total: $ 1.500,00", RolePreference::Issuer);
        let two = extractor.extract_from_text(
            "Fecha de emisión 02/03/2024\nTotal: $ 1.500,00",
            RolePreference::Issuer,
        );
        assert_eq!(one.recovered_critical_fields(), vec!["total"]);
        assert!(two.confidence > one.confidence);
        assert!(two.confidence < 1.0);
    }

    #[test]
    fn test_fallbacks_without_labels() {
        let text = "ACME SERVICIOS S.A.\nremito 12/03/2024\n1.200,00\n15.000,00\n300,50";
        let record = HeuristicExtractor::new().extract_from_text(text, RolePreference::Issuer);
        assert_eq!(record.supplier.name.as_deref(), Some("ACME SERVICIOS S.A."));
        assert_eq!(record.issue_date, date(2024, 3, 12));
        assert_eq!(record.amounts.total, Some(Decimal::new(1500000, 2)));
    }

    #[test]
    fn test_subtotal_is_not_total() {
        let text = "Subtotal: 100,00\nIVA 21%: 21,00\nTotal: 121,00";
        let record = HeuristicExtractor::new().extract_from_text(text, RolePreference::Issuer);
        assert_eq!(record.amounts.total, Some(Decimal::new(12100, 2)));
        assert_eq!(record.amounts.net, Some(Decimal::new(10000, 2)));
    }

    #[test]
    fn test_composite_number_and_letter_before() {
        let text = "B FACTURA\nN° 0012-00004567\nFecha: 05/09/2024";
        let record = HeuristicExtractor::new().extract_from_text(text, RolePreference::Issuer);
        assert_eq!(record.type_letter, Some(TypeLetter::B));
        assert_eq!(record.document_id.as_deref(), Some("B-0012-00004567"));
    }

    #[test]
    fn test_labeled_composite_number() {
        let text = "FACTURA A\nComprobante Nro: 0001-00001234\nTotal: 10,00";
        let record = HeuristicExtractor::new().extract_from_text(text, RolePreference::Issuer);
        assert_eq!(record.point_of_sale.as_deref(), Some("0001"));
        assert_eq!(record.invoice_number.as_deref(), Some("00001234"));
        assert_eq!(record.document_id.as_deref(), Some("A-0001-00001234"));
    }

    #[test]
    fn test_labeled_number_without_point_of_sale() {
        let text = "FACTURA B\nPunto de Venta: 7\nFecha: 01/02/2025\nComp. Nro: 2041";
        let record = HeuristicExtractor::new().extract_from_text(text, RolePreference::Issuer);
        assert_eq!(record.point_of_sale.as_deref(), Some("0007"));
        assert_eq!(record.invoice_number.as_deref(), Some("00002041"));
    }

    #[test]
    fn test_total_fallback_ignores_dashed_cuit() {
        let text = "ACME SERVICIOS S.A.\nC.U.I.T.: 30-71438582-4\nFecha: 01/08/2025\n$ 12.100,00";
        let record = HeuristicExtractor::new().extract_from_text(text, RolePreference::Issuer);
        assert_eq!(record.amounts.total, Some(Decimal::new(1210000, 2)));
        assert_eq!(record.supplier.tax_id.as_deref(), Some("30714385824"));
    }

    #[test]
    fn test_recipient_role_swaps_parties() {
        let text = "EMPRESA DEMO S.A.\nCUIT: 30714385824\nCliente\nCOMERCIAL NORTE SRL\nCUIT: 20123456786";
        let record = HeuristicExtractor::new().extract_from_text(text, RolePreference::Recipient);
        assert_eq!(record.supplier.name.as_deref(), Some("COMERCIAL NORTE SRL"));
        assert_eq!(record.supplier.tax_id.as_deref(), Some("20123456786"));
        assert_eq!(record.customer.tax_id.as_deref(), Some("30714385824"));
    }

    #[test]
    fn test_usd_currency_detected() {
        let record = HeuristicExtractor::new()
            .extract_from_text("Importe Total: U$S 1,250.00", RolePreference::Issuer);
        assert_eq!(record.amounts.currency_code, "USD");
        assert_eq!(record.amounts.total, Some(Decimal::new(125000, 2)));
    }

    #[test]
    fn test_qr_fills_gaps_only() {
        use base64::Engine;
        let payload = r#"{"fecha":"2025-08-01","importe":453750,"cuit":30714385824,"ptoVta":3,"tipoCmp":1,"nroCmp":3526,"moneda":"PES","codAut":75314579648345}"#;
        let url = format!(
            "https://www.afip.gob.ar/fe/qr/?p={}",
            base64::engine::general_purpose::STANDARD.encode(payload)
        );

        let text = format!("COMERCIAL NORTE SRL\nFecha: 02/08/2025\n{}", url);
        let record = HeuristicExtractor::new().extract_from_text(&text, RolePreference::Issuer);
        assert_eq!(record.issue_date, date(2025, 8, 2));
        assert_eq!(record.amounts.total, Some(Decimal::new(453750, 0)));
        assert_eq!(record.supplier.tax_id.as_deref(), Some("30714385824"));
        assert_eq!(record.document_id.as_deref(), Some("A-0003-00003526"));
        assert_eq!(record.authorization.number.as_deref(), Some("75314579648345"));
    }

    #[test]
    fn test_pad_digits() {
        assert_eq!(pad_digits("3", 4).as_deref(), Some("0003"));
        assert_eq!(pad_digits("00003526", 8).as_deref(), Some("00003526"));
        assert_eq!(pad_digits("00012", 4).as_deref(), Some("0012"));
        assert_eq!(pad_digits("12345", 4), None);
        assert_eq!(pad_digits("abc", 4), None);
    }
}
