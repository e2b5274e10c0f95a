//! Tolerant (de)serializers for provider JSON.
//!
//! Vision models and older clients return numbers as strings, dates in
//! regional shapes and fixed-width identifiers as bare integers. These helpers
//! accept all of them and degrade to `None` instead of failing the whole
//! record; amounts always serialize back out as JSON numbers.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

use crate::invoice::rules::amounts::{parse_amount, round_money};
use crate::invoice::rules::dates::find_date;

/// Convert an arbitrary JSON value into a money amount.
pub fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let repr = n.to_string();
            Decimal::from_str(&repr)
                .or_else(|_| Decimal::from_scientific(&repr))
                .ok()
                .map(round_money)
        }
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Optional amount: number or formatted string in, JSON number out.
pub mod amount {
    use super::*;

    pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value.and_then(|d| d.to_f64()) {
            Some(f) => serializer.serialize_f64(f),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(value_to_decimal))
    }
}

/// Required amount; unparseable input becomes zero.
pub mod money {
    use super::*;

    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_f64().unwrap_or_default())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(value_to_decimal).unwrap_or_default())
    }
}

/// Tax rate kept to four decimals; `"21%"` and `"10,5"` are accepted.
pub mod rate {
    use super::*;

    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_f64().unwrap_or_default())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        let parsed = match value {
            Some(Value::Number(n)) => {
                let repr = n.to_string();
                Decimal::from_str(&repr)
                    .or_else(|_| Decimal::from_scientific(&repr))
                    .ok()
            }
            Some(Value::String(s)) => {
                let cleaned = s.trim().trim_end_matches('%').trim().replace(',', ".");
                Decimal::from_str(&cleaned).ok()
            }
            _ => None,
        };
        Ok(parsed.map(|r| r.round_dp(4)).unwrap_or_default())
    }
}

/// Date in any supported shape; garbage becomes `None`.
pub fn date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_text).and_then(|s| find_date(&s)))
}

/// String or number; blank strings become `None`.
pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_text))
}

/// Confidence score clamped into `[0, 1]`.
pub fn confidence<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw
        .filter(|f| f.is_finite())
        .map(|f| f.clamp(0.0, 1.0) as f32)
        .unwrap_or(0.0))
}

/// Boolean that also accepts `"true"`/`"false"` strings.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Probe {
        #[serde(default, with = "amount")]
        total: Option<Decimal>,
        #[serde(default, deserialize_with = "date")]
        issued: Option<NaiveDate>,
        #[serde(default, deserialize_with = "text")]
        code: Option<String>,
        #[serde(default, deserialize_with = "confidence")]
        score: f32,
    }

    #[test]
    fn test_amount_from_number_and_string() {
        let a: Probe = serde_json::from_str(r#"{"total": 453750.5}"#).unwrap();
        let b: Probe = serde_json::from_str(r#"{"total": "453.750,50"}"#).unwrap();
        assert_eq!(a.total, Some(Decimal::new(45375050, 2)));
        assert_eq!(a.total, b.total);
    }

    #[test]
    fn test_amount_serializes_as_number() {
        let probe = Probe {
            total: Some(Decimal::new(123456, 2)),
            issued: None,
            code: None,
            score: 0.0,
        };
        let json = serde_json::to_value(&probe).unwrap();
        assert_eq!(json["total"], serde_json::json!(1234.56));
    }

    #[test]
    fn test_unparseable_values_become_none() {
        let probe: Probe = serde_json::from_str(
            r#"{"total": "n/a", "issued": "31/02/2024", "code": "  ", "score": "high"}"#,
        )
        .unwrap();
        assert_eq!(probe.total, None);
        assert_eq!(probe.issued, None);
        assert_eq!(probe.code, None);
        assert_eq!(probe.score, 0.0);
    }

    #[test]
    fn test_rate_keeps_precision() {
        #[derive(Deserialize)]
        struct Line {
            #[serde(with = "rate")]
            rate: Decimal,
        }
        let a: Line = serde_json::from_str(r#"{"rate": 0.105}"#).unwrap();
        let b: Line = serde_json::from_str(r#"{"rate": "10,5%"}"#).unwrap();
        let c: Line = serde_json::from_str(r#"{"rate": "abc"}"#).unwrap();
        assert_eq!(a.rate, Decimal::new(105, 3));
        assert_eq!(b.rate, Decimal::new(105, 1));
        assert_eq!(c.rate, Decimal::ZERO);
    }

    #[test]
    fn test_numeric_identifier_becomes_text() {
        let probe: Probe = serde_json::from_str(r#"{"code": 3, "score": 1.7}"#).unwrap();
        assert_eq!(probe.code.as_deref(), Some("3"));
        assert_eq!(probe.score, 1.0);
    }
}
