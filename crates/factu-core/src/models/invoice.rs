//! Normalized invoice record produced by the extraction pipeline.
//!
//! Every field is optional: a record is emitted even when nothing could be
//! recovered, and downstream workflows decide what to do with the gaps.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::lenient;

/// Currency assumed when the document does not state one.
pub const DEFAULT_CURRENCY: &str = "ARS";

/// A complete extraction result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceExtract {
    /// Issuing party.
    pub supplier: Party,

    /// Receiving party.
    pub customer: Party,

    /// Fiscal subtype letter.
    #[serde(deserialize_with = "type_letter")]
    pub type_letter: Option<TypeLetter>,

    /// Fiscal document code paired with the letter ("01", "06", "11").
    #[serde(deserialize_with = "lenient::text")]
    pub doc_code: Option<String>,

    /// 4-digit zero-padded issuing point.
    #[serde(deserialize_with = "lenient::text")]
    pub point_of_sale: Option<String>,

    /// 8-digit zero-padded sequence number.
    #[serde(deserialize_with = "lenient::text")]
    pub invoice_number: Option<String>,

    /// `{letter}-{point_of_sale}-{invoice_number}`.
    #[serde(deserialize_with = "lenient::text")]
    pub document_id: Option<String>,

    #[serde(deserialize_with = "lenient::date")]
    pub issue_date: Option<NaiveDate>,

    #[serde(deserialize_with = "lenient::date")]
    pub due_date: Option<NaiveDate>,

    pub service_period: ServicePeriod,

    /// Free text found after a sale-condition label.
    #[serde(deserialize_with = "lenient::text")]
    pub payment_terms: Option<String>,

    pub amounts: Amounts,

    pub bank: BankDetails,

    /// Government authorization stamp (CAE).
    pub authorization: AuthorizationCode,

    /// Self-reported extraction quality in `[0, 1]`.
    #[serde(deserialize_with = "lenient::confidence")]
    pub confidence: f32,

    /// A human should verify this record before it is trusted.
    #[serde(deserialize_with = "lenient::flag")]
    pub needs_review: bool,

    /// Provenance of the document (URL or path), never its content.
    pub source_reference: String,

    /// Provider attempts that produced this record.
    pub audit: AuditLog,
}

/// Name and tax id of one party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Party {
    #[serde(deserialize_with = "lenient::text")]
    pub name: Option<String>,

    /// 11-digit CUIT, digits only.
    #[serde(deserialize_with = "lenient::text")]
    pub tax_id: Option<String>,
}

/// Fiscal subtype of an Argentine invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeLetter {
    A,
    B,
    C,
}

impl TypeLetter {
    /// Parse a letter or its AFIP document code.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" | "1" | "01" | "001" => Some(TypeLetter::A),
            "B" | "6" | "06" | "006" => Some(TypeLetter::B),
            "C" | "11" | "011" => Some(TypeLetter::C),
            _ => None,
        }
    }

    /// Map an AFIP numeric document code.
    pub fn from_doc_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(TypeLetter::A),
            6 => Some(TypeLetter::B),
            11 => Some(TypeLetter::C),
            _ => None,
        }
    }

    /// AFIP document code for this letter.
    pub fn doc_code(&self) -> &'static str {
        match self {
            TypeLetter::A => "01",
            TypeLetter::B => "06",
            TypeLetter::C => "11",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeLetter::A => "A",
            TypeLetter::B => "B",
            TypeLetter::C => "C",
        }
    }
}

impl fmt::Display for TypeLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn type_letter<'de, D>(deserializer: D) -> Result<Option<TypeLetter>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => TypeLetter::parse(&s),
        Some(serde_json::Value::Number(n)) => {
            n.as_u64().and_then(|c| TypeLetter::from_doc_code(c as u32))
        }
        _ => None,
    })
}

/// Billing period for services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePeriod {
    #[serde(deserialize_with = "lenient::date")]
    pub from: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::date")]
    pub to: Option<NaiveDate>,
}

impl ServicePeriod {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Monetary breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Amounts {
    #[serde(with = "lenient::amount")]
    pub net: Option<Decimal>,

    pub taxes: Vec<TaxLine>,

    #[serde(with = "lenient::amount")]
    pub total: Option<Decimal>,

    pub currency_code: String,

    /// Net and taxes were derived from the total with an assumed rate.
    #[serde(deserialize_with = "lenient::flag")]
    pub estimated: bool,
}

impl Default for Amounts {
    fn default() -> Self {
        Self {
            net: None,
            taxes: Vec::new(),
            total: None,
            currency_code: DEFAULT_CURRENCY.to_string(),
            estimated: false,
        }
    }
}

impl Amounts {
    /// Sum of all tax line amounts, `None` on overflow.
    pub fn tax_sum(&self) -> Option<Decimal> {
        self.taxes
            .iter()
            .try_fold(Decimal::ZERO, |sum, t| sum.checked_add(t.amount))
    }
}

/// One tax line, e.g. IVA 21%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLine {
    #[serde(rename = "type", default = "default_tax_kind")]
    pub kind: String,

    /// Rate as a fraction (0.21 for 21%).
    #[serde(default, with = "lenient::rate")]
    pub rate: Decimal,

    #[serde(default, with = "lenient::money")]
    pub amount: Decimal,
}

fn default_tax_kind() -> String {
    "IVA".to_string()
}

impl TaxLine {
    pub fn new(kind: impl Into<String>, rate: Decimal, amount: Decimal) -> Self {
        Self {
            kind: kind.into(),
            rate,
            amount,
        }
    }
}

/// Bank details printed on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankDetails {
    #[serde(deserialize_with = "lenient::text")]
    pub bank_name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub branch: Option<String>,
    /// 22-digit account key.
    #[serde(deserialize_with = "lenient::text")]
    pub cbu: Option<String>,
}

/// Authorization code and its expiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationCode {
    #[serde(deserialize_with = "lenient::text")]
    pub number: Option<String>,
    #[serde(deserialize_with = "lenient::date")]
    pub due_date: Option<NaiveDate>,
}

/// Trail of provider attempts for one extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditLog {
    /// Providers in the order they ran.
    pub providers_used: Vec<String>,

    /// Wall time per provider in milliseconds.
    pub processing_times: BTreeMap<String, u64>,

    /// Provider whose result was kept.
    pub final_provider: Option<String>,

    /// One entry per failed attempt.
    pub error_logs: Vec<String>,
}

/// Which party "business name" should resolve to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolePreference {
    #[default]
    Issuer,
    Recipient,
}

impl std::str::FromStr for RolePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "issuer" | "supplier" | "emisor" => Ok(RolePreference::Issuer),
            "recipient" | "customer" | "receptor" => Ok(RolePreference::Recipient),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Critical fields counted by the text heuristic's confidence score.
pub const CRITICAL_FIELDS: [&str; 6] = [
    "type_letter",
    "point_of_sale",
    "invoice_number",
    "total",
    "supplier_name",
    "issue_date",
];

impl InvoiceExtract {
    /// Create an empty record for the given document.
    pub fn new(source_reference: impl Into<String>) -> Self {
        Self {
            source_reference: source_reference.into(),
            ..Self::default()
        }
    }

    /// Record returned when every provider failed.
    pub fn exhausted(source_reference: impl Into<String>) -> Self {
        Self {
            needs_review: true,
            ..Self::new(source_reference)
        }
    }

    /// Names of the critical fields that are present.
    pub fn recovered_critical_fields(&self) -> Vec<&'static str> {
        let present = [
            self.type_letter.is_some(),
            self.point_of_sale.is_some(),
            self.invoice_number.is_some(),
            self.amounts.total.is_some(),
            self.supplier.name.is_some(),
            self.issue_date.is_some(),
        ];
        CRITICAL_FIELDS
            .iter()
            .zip(present)
            .filter_map(|(name, ok)| ok.then_some(*name))
            .collect()
    }

    /// `{letter}-{pos}-{number}` once both numbers are known.
    pub fn compose_document_id(&self) -> Option<String> {
        let pos = self.point_of_sale.as_ref()?;
        let number = self.invoice_number.as_ref()?;
        let letter = self.type_letter.map(|l| l.as_str()).unwrap_or("X");
        Some(format!("{}-{}-{}", letter, pos, number))
    }

    /// Whether no field at all was recovered.
    pub fn is_blank(&self) -> bool {
        self.recovered_critical_fields().is_empty()
            && self.supplier.tax_id.is_none()
            && self.customer == Party::default()
            && self.due_date.is_none()
            && self.service_period.is_empty()
            && self.amounts.net.is_none()
            && self.amounts.taxes.is_empty()
            && self.authorization == AuthorizationCode::default()
    }
}
