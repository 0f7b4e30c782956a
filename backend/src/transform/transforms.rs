//! Value transforms applied to resolved raw values.
//!
//! Transforms are referenced by name from mapping configuration
//! (`"transformFunction": "parseCurrency"`) and resolved once into a
//! [`Transform`] when the mapping set is built. Every transform is total:
//! bad input yields a sentinel (`0`, `null`, `false`, `"Invalid Date"`),
//! never an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Returned by [`Transform::ParseDate`] when the input is not a date.
pub const INVALID_DATE: &str = "Invalid Date";

/// Values [`Transform::ParseBoolean`] accepts as `true` (after trim + lower-case).
pub const AFFIRMATIVE_VALUES: [&str; 5] = ["sim", "yes", "1", "true", "verdadeiro"];

/// Anything that is not part of a number in Brazilian notation.
static CURRENCY_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9.,\-]").expect("static regex"));

/// Naive date-time layouts, interpreted as UTC.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Date-only layouts, interpreted as UTC midnight.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Largest distance from the epoch a date can have, in milliseconds.
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// The closed set of registered transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transform {
    /// Brazilian-locale currency string to number (`"R$ 1.234,56"` → `1234.56`)
    ParseCurrency,

    /// Anything date-like to an ISO-8601 UTC string
    ParseDate,

    /// Affirmative word (`sim`, `yes`, ...) to boolean
    ParseBoolean,

    /// Loose numeric coercion, `null` when not a finite number
    ParseNumber,
}

impl Transform {
    /// Every registered transform, in catalogue order.
    pub const ALL: [Transform; 4] = [
        Transform::ParseCurrency,
        Transform::ParseDate,
        Transform::ParseBoolean,
        Transform::ParseNumber,
    ];

    /// Look up a transform by its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Configuration name of this transform.
    pub fn name(&self) -> &'static str {
        match self {
            Transform::ParseCurrency => "parseCurrency",
            Transform::ParseDate => "parseDate",
            Transform::ParseBoolean => "parseBoolean",
            Transform::ParseNumber => "parseNumber",
        }
    }

    /// One-line description for the CLI catalogue.
    pub fn description(&self) -> &'static str {
        match self {
            Transform::ParseCurrency => {
                "Strip currency symbols, '.' = thousands, ',' = decimal; 0 when unparsable"
            }
            Transform::ParseDate => {
                "ISO-8601 UTC string; null when empty, \"Invalid Date\" when unparsable"
            }
            Transform::ParseBoolean => "true for sim/yes/1/true/verdadeiro, otherwise false",
            Transform::ParseNumber => "Numeric coercion; null when not a finite number",
        }
    }

    /// Apply this transform to a value
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Transform::ParseCurrency => parse_currency(value),
            Transform::ParseDate => parse_date(value),
            Transform::ParseBoolean => parse_boolean(value),
            Transform::ParseNumber => parse_number(value),
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Transforms
// =============================================================================

/// Parse a currency amount written with `.` thousands and `,` decimals.
pub fn parse_currency(value: &Value) -> Value {
    if let Value::Number(n) = value {
        if n.as_f64().is_some_and(f64::is_finite) {
            return value.clone();
        }
    }
    number_value(parse_currency_str(&js_string(value)))
}

/// String half of [`parse_currency`].
pub fn parse_currency_str(text: &str) -> f64 {
    let cleaned = CURRENCY_NOISE.replace_all(text, "");
    let normalized = cleaned.replace('.', "").replacen(',', ".", 1);
    parse_float_prefix(&normalized)
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Convert a date-like value to an ISO-8601 string.
pub fn parse_date(value: &Value) -> Value {
    if !is_truthy(value) {
        return Value::Null;
    }

    let parsed = match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch_millis),
        Value::Bool(_) => from_epoch_millis(1.0),
        Value::String(s) => parse_date_str(s),
        _ => None,
    };

    match parsed {
        Some(date) => Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => Value::String(INVALID_DATE.to_string()),
    }
}

/// String half of [`parse_date`].
pub fn parse_date_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(text) {
        return Some(date.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Convert an affirmative word to `true`, anything else to `false`.
pub fn parse_boolean(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        _ => {
            let text = js_string(value).trim().to_lowercase();
            Value::Bool(AFFIRMATIVE_VALUES.contains(&text.as_str()))
        }
    }
}

/// Coerce to a number, or `null` when the result is not finite.
pub fn parse_number(value: &Value) -> Value {
    let n = match value {
        Value::Number(_) => return value.clone(),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null => 0.0,
        Value::String(s) => {
            let text = s.trim();
            if text.is_empty() {
                0.0
            } else {
                match parse_decimal(text) {
                    Some(n) => n,
                    None => return Value::Null,
                }
            }
        }
        Value::Array(_) | Value::Object(_) => return Value::Null,
    };
    number_value(n)
}

// =============================================================================
// Helpers
// =============================================================================

/// Loose truthiness: `null`, `false`, `0` and `""` are falsy, everything else
/// (including empty arrays and objects) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a value the way a loosely-typed host would stringify it.
fn js_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            // 1.0 prints as "1"
            Some(f) if n.is_f64() && is_safe_integer(f) => (f as i64).to_string(),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Integral values become JSON integers, the rest JSON floats.
fn number_value(n: f64) -> Value {
    if is_safe_integer(n) {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Integral and exactly representable as an `f64`.
fn is_safe_integer(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0
}

/// Longest leading `[-+]digits[.digits]` prefix, like `parseFloat`.
fn parse_float_prefix(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            has_digits = true;
            end = frac_end;
        }
    }

    if !has_digits {
        return None;
    }
    text[..end].parse().ok()
}

/// Decimal, exponent, or `0x`/`0o`/`0b` prefixed literal.
fn parse_decimal(text: &str) -> Option<f64> {
    let radix = match text.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };

    let parsed = match radix {
        Some(radix) => u64::from_str_radix(&text[2..], radix).ok().map(|n| n as f64),
        None => text.parse::<f64>().ok(),
    };
    parsed.filter(|n| n.is_finite())
}

fn from_epoch_millis(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() || ms.abs() > MAX_EPOCH_MILLIS {
        return None;
    }
    DateTime::from_timestamp_millis(ms.trunc() as i64)
}

/// Catalogue of available transforms for the CLI.
pub fn transforms_description() -> String {
    let mut out = String::from(
        "Available transforms:\n\n| Transform | Description |\n|-----------|-------------|\n",
    );
    for t in Transform::ALL {
        out.push_str(&format!("| {} | {} |\n", t.name(), t.description()));
    }
    out.push_str(
        r#"
Example mapping:
{
  "targetField": "valor_ficha",
  "legacyAliases": ["Valor Ficha", "R$/Ficha"],
  "transformFunction": "parseCurrency",
  "isRequired": false
}"#,
    );
    out
}
