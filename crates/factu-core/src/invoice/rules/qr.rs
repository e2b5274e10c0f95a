//! AFIP verification-QR decoding.
//!
//! Electronic invoices print a QR pointing at
//! `https://www.afip.gob.ar/fe/qr/?p=<base64 JSON>`. The payload is tied to
//! the filed document, so its values are trusted over text heuristics.

use base64::Engine;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::alphabet;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::cuit::normalize_cuit;
use super::patterns::AFIP_QR;
use crate::models::invoice::TypeLetter;
use crate::models::lenient::{self, value_to_decimal};

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Fields recovered from the QR payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthQr {
    pub issue_date: Option<NaiveDate>,
    pub total: Option<Decimal>,
    pub tax_id: Option<String>,
    pub point_of_sale: Option<String>,
    pub invoice_number: Option<String>,
    pub type_letter: Option<TypeLetter>,
    pub currency_code: Option<String>,
    pub authorization_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrPayload {
    #[serde(default, deserialize_with = "lenient::date")]
    fecha: Option<NaiveDate>,
    #[serde(default)]
    importe: Option<Value>,
    #[serde(default)]
    cuit: Option<Value>,
    #[serde(default)]
    pto_vta: Option<u32>,
    #[serde(default)]
    tipo_cmp: Option<u32>,
    #[serde(default)]
    nro_cmp: Option<u64>,
    #[serde(default)]
    moneda: Option<String>,
    #[serde(default)]
    cod_aut: Option<Value>,
}

/// Decode the first AFIP QR URL found in `text`.
///
/// Returns `None` for any failure: no URL, bad base64, bad JSON, or a payload
/// without a usable date or amount.
pub fn decode_auth_qr(text: &str) -> Option<AuthQr> {
    let caps = AFIP_QR.captures(text)?;
    let encoded = caps[1]
        .replace("%3D", "=")
        .replace("%3d", "=")
        .replace('-', "+")
        .replace('_', "/");

    let bytes = match LENIENT_STANDARD.decode(encoded.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Ignoring QR payload with invalid base64: {}", e);
            return None;
        }
    };
    let payload: QrPayload = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("Ignoring QR payload with invalid JSON: {}", e);
            return None;
        }
    };

    let qr = AuthQr {
        issue_date: payload.fecha,
        total: payload.importe.as_ref().and_then(value_to_decimal),
        tax_id: payload.cuit.as_ref().map(value_text).and_then(|s| normalize_cuit(&s)),
        point_of_sale: payload.pto_vta.map(|p| format!("{:04}", p)),
        invoice_number: payload.nro_cmp.map(|n| format!("{:08}", n)),
        type_letter: payload.tipo_cmp.and_then(TypeLetter::from_doc_code),
        currency_code: payload.moneda.as_deref().map(currency_from_afip),
        authorization_number: payload.cod_aut.as_ref().map(value_text),
    };

    if qr.issue_date.is_none() && qr.total.is_none() {
        return None;
    }
    Some(qr)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// AFIP currency codes to ISO 4217.
fn currency_from_afip(code: &str) -> String {
    match code.trim().to_uppercase().as_str() {
        "PES" => "ARS".to_string(),
        "DOL" => "USD".to_string(),
        "060" => "EUR".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    const PAYLOAD: &str = r#"{"ver":1,"fecha":"2025-08-01","cuit":30714385824,"ptoVta":3,"tipoCmp":1,"nroCmp":3526,"importe":453750.00,"moneda":"PES","ctz":1,"tipoDocRec":80,"nroDocRec":20123456786,"tipoCodAut":"E","codAut":75314579648345}"#;

    fn qr_text(encoded: &str) -> String {
        format!("Comprobante autorizado\nhttps://www.afip.gob.ar/fe/qr/?p={}\n", encoded)
    }

    #[test]
    fn test_decode_standard_payload() {
        let text = qr_text(&STANDARD.encode(PAYLOAD));
        let qr = decode_auth_qr(&text).unwrap();
        assert_eq!(qr.issue_date, NaiveDate::from_ymd_opt(2025, 8, 1));
        assert_eq!(qr.total, Some(Decimal::new(45375000, 2)));
        assert_eq!(qr.tax_id.as_deref(), Some("30714385824"));
        assert_eq!(qr.point_of_sale.as_deref(), Some("0003"));
        assert_eq!(qr.invoice_number.as_deref(), Some("00003526"));
        assert_eq!(qr.type_letter, Some(TypeLetter::A));
        assert_eq!(qr.currency_code.as_deref(), Some("ARS"));
        assert_eq!(qr.authorization_number.as_deref(), Some("75314579648345"));
    }

    #[test]
    fn test_decode_url_safe_unpadded_payload() {
        let text = qr_text(&URL_SAFE_NO_PAD.encode(PAYLOAD));
        assert!(decode_auth_qr(&text).is_some());
    }

    #[test]
    fn test_failures_are_silent() {
        assert_eq!(decode_auth_qr("no qr here"), None);
        assert_eq!(decode_auth_qr(&qr_text("!!!notbase64")), None);
        assert_eq!(decode_auth_qr(&qr_text(&STANDARD.encode("not json"))), None);
        assert_eq!(decode_auth_qr(&qr_text(&STANDARD.encode(r#"{"ver":1}"#))), None);
    }
}
