//! Value codecs for custom logical types.
//!
//! The engine calls [`CodecKind::encode`] before validating a value it is
//! about to store and [`CodecKind::decode`] after fetching it.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const MAX_EXPONENT: i64 = 4096;

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("{codec:?} codec cannot handle a {found} value")]
    Unsupported { codec: CodecKind, found: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Arbitrary-precision number kept as canonical decimal text.
    BigNumber,
    /// Date-time without time zone.
    Timestamp,
}

impl CodecKind {
    pub fn encode(self, value: &Value) -> Result<Value, CodecError> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::BigNumber, _) => big_number(self, value).map(Value::String),
            (Self::Timestamp, _) => {
                timestamp(self, value).map(|t| Value::String(t.format(TIMESTAMP_FORMAT).to_string()))
            }
        }
    }

    pub fn decode(self, value: &Value) -> Result<Value, CodecError> {
        // Both directions canonicalize; stored text decodes to the same form.
        self.encode(value)
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn big_number(codec: CodecKind, value: &Value) -> Result<String, CodecError> {
    match value {
        Value::Number(n) => normalize_decimal(&n.to_string()),
        Value::String(s) => normalize_decimal(s),
        other => Err(CodecError::Unsupported {
            codec,
            found: kind_name(other),
        }),
    }
}

/// Canonical decimal text: no exponent, no leading zeros in the integer
/// part, no trailing zeros in the fraction, no negative zero.
pub fn normalize_decimal(raw: &str) -> Result<String, CodecError> {
    let invalid = || CodecError::InvalidNumber(raw.to_string());
    let text = raw.trim();

    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => {
            let exp: i64 = unsigned[pos + 1..].parse().map_err(|_| invalid())?;
            if exp.abs() > MAX_EXPONENT {
                return Err(invalid());
            }
            (&unsigned[..pos], exp)
        }
        None => (unsigned, 0),
    };

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    // Shift the decimal point by the exponent over the concatenated digits.
    let digits: String = format!("{int_part}{frac_part}");
    let point = int_part.len() as i64 + exponent;
    let (int_digits, frac_digits) = if point <= 0 {
        let zeros = "0".repeat(point.unsigned_abs() as usize);
        (String::new(), format!("{zeros}{digits}"))
    } else if point as usize >= digits.len() {
        let zeros = "0".repeat(point as usize - digits.len());
        (format!("{digits}{zeros}"), String::new())
    } else {
        let (i, f) = digits.split_at(point as usize);
        (i.to_string(), f.to_string())
    };

    let int_digits = int_digits.trim_start_matches('0');
    let frac_digits = frac_digits.trim_end_matches('0');
    let int_digits = if int_digits.is_empty() { "0" } else { int_digits };

    let mut out = String::new();
    if negative && !(int_digits == "0" && frac_digits.is_empty()) {
        out.push('-');
    }
    out.push_str(int_digits);
    if !frac_digits.is_empty() {
        out.push('.');
        out.push_str(frac_digits);
    }
    Ok(out)
}

fn timestamp(codec: CodecKind, value: &Value) -> Result<NaiveDateTime, CodecError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|t| t.naive_utc())
            .ok_or_else(|| CodecError::InvalidTimestamp(n.to_string())),
        Value::String(s) => parse_timestamp(s),
        other => Err(CodecError::Unsupported {
            codec,
            found: kind_name(other),
        }),
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, CodecError> {
    let text = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(t);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| CodecError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_decimal() {
        assert_eq!(normalize_decimal("00123").unwrap(), "123");
        assert_eq!(normalize_decimal("-0.500").unwrap(), "-0.5");
        assert_eq!(normalize_decimal("-0").unwrap(), "0");
        assert_eq!(normalize_decimal("1e21").unwrap(), "1000000000000000000000");
        assert_eq!(normalize_decimal("1.5E-3").unwrap(), "0.0015");
        assert_eq!(normalize_decimal(".25").unwrap(), "0.25");
        assert_eq!(
            normalize_decimal("123456789012345678901234567890").unwrap(),
            "123456789012345678901234567890"
        );
        assert!(normalize_decimal("12a").is_err());
        assert!(normalize_decimal("").is_err());
        assert!(normalize_decimal("1e").is_err());
    }

    #[test]
    fn test_big_number_codec() {
        let codec = CodecKind::BigNumber;
        assert_eq!(codec.encode(&json!(42)).unwrap(), json!("42"));
        assert_eq!(codec.encode(&json!("0042.10")).unwrap(), json!("42.1"));
        assert_eq!(codec.decode(&json!("99")).unwrap(), json!("99"));
        assert_eq!(codec.encode(&Value::Null).unwrap(), Value::Null);
        assert!(matches!(
            codec.encode(&json!(true)),
            Err(CodecError::Unsupported { found: "boolean", .. })
        ));
    }

    #[test]
    fn test_timestamp_codec() {
        let codec = CodecKind::Timestamp;
        assert_eq!(
            codec.decode(&json!("2024-03-01 10:20:30")).unwrap(),
            json!("2024-03-01T10:20:30.000")
        );
        assert_eq!(
            codec.decode(&json!("2024-03-01T10:20:30+02:00")).unwrap(),
            json!("2024-03-01T08:20:30.000")
        );
        assert_eq!(codec.decode(&json!(0)).unwrap(), json!("1970-01-01T00:00:00.000"));
        assert_eq!(
            codec.encode(&json!("2024-03-01")).unwrap(),
            json!("2024-03-01T00:00:00.000")
        );
        assert!(codec.decode(&json!("yesterday")).is_err());
    }
}
