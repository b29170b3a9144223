use std::{fmt, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A cell as it comes out of a vendor file, before any mapping is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl RawValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawValue::Empty)
    }

    pub fn as_display(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.clone(),
            RawValue::Integer(i) => i.to_string(),
            RawValue::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            RawValue::Boolean(b) => b.to_string(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(value.to_string())
        }
    }
}

/// Logical type of a target field, derived from the store's declared SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Decimal,
}

impl FieldType {
    /// Classifies a declared SQL type name such as `varchar(40)`, `numeric(18,2)` or `int`.
    /// Unknown names fall back to string.
    pub fn from_sql_type(name: &str) -> Self {
        let lowered = name.trim().to_ascii_lowercase();
        if lowered.contains("char") || lowered.contains("text") || lowered == "str" {
            FieldType::String
        } else if ["float", "real", "decimal", "numeric", "money"]
            .iter()
            .any(|token| lowered.contains(token))
        {
            FieldType::Decimal
        } else if lowered.contains("int") {
            FieldType::Integer
        } else {
            FieldType::String
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
        };
        f.write_str(label)
    }
}

/// A typed value in a projected row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// True for nulls and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Textual form handed to the store; `None` is the store's null marker.
    pub fn as_sql_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Decimal(d) => Some(d.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("NULL"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Decimal(d) => write!(f, "{d}"),
        }
    }
}

pub fn parse_decimal_literal(value: &str) -> Result<Decimal> {
    let compact: String = value
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        bail!("Empty decimal literal");
    }
    let normalized = if compact.contains(',') && !compact.contains('.') {
        compact.replace(',', ".")
    } else {
        compact
    };
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .with_context(|| format!("Failed to parse '{value}' as decimal"))
}

fn parse_integer_literal(value: &str) -> Result<i64> {
    let trimmed = value.trim();
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Ok(parsed);
    }
    let decimal = parse_decimal_literal(trimmed)
        .with_context(|| format!("Failed to parse '{value}' as integer"))?;
    integral_decimal(decimal).ok_or_else(|| anyhow!("'{value}' is not a whole number"))
}

fn integral_decimal(decimal: Decimal) -> Option<i64> {
    if decimal.fract().is_zero() {
        decimal.to_i64()
    } else {
        None
    }
}

/// Coerces a text literal (a constant rule or a delimited cell) to `ty`.
pub fn coerce_text(value: &str, ty: FieldType) -> Result<FieldValue> {
    if value.is_empty() {
        return Ok(FieldValue::Null);
    }
    let coerced = match ty {
        FieldType::String => FieldValue::Text(value.to_string()),
        FieldType::Integer => FieldValue::Integer(parse_integer_literal(value)?),
        FieldType::Decimal => FieldValue::Decimal(parse_decimal_literal(value)?),
    };
    Ok(coerced)
}

/// Coerces a raw cell to `ty`. Spreadsheet numbers keep their numeric identity;
/// text goes through [`coerce_text`].
pub fn coerce_raw(value: &RawValue, ty: FieldType) -> Result<FieldValue> {
    match (value, ty) {
        (RawValue::Empty, _) => Ok(FieldValue::Null),
        (RawValue::Text(s), _) => coerce_text(s, ty),
        (RawValue::Integer(i), FieldType::Integer) => Ok(FieldValue::Integer(*i)),
        (RawValue::Integer(i), FieldType::Decimal) => Ok(FieldValue::Decimal(Decimal::from(*i))),
        (RawValue::Float(f), FieldType::Decimal) => {
            if !f.is_finite() {
                bail!("'{f}' is not a finite number");
            }
            // f64 Display is the shortest round-trip form, so 7.25 stays 7.25.
            Ok(FieldValue::Decimal(parse_decimal_literal(&f.to_string())?))
        }
        (RawValue::Float(f), FieldType::Integer) => {
            let decimal = parse_decimal_literal(&f.to_string())?;
            integral_decimal(decimal)
                .map(FieldValue::Integer)
                .ok_or_else(|| anyhow!("'{f}' is not a whole number"))
        }
        (RawValue::Boolean(b), FieldType::Integer) => Ok(FieldValue::Integer(i64::from(*b))),
        (RawValue::Boolean(b), FieldType::Decimal) => {
            bail!("Boolean '{b}' cannot be loaded as decimal")
        }
        (other, FieldType::String) => Ok(FieldValue::Text(other.as_display())),
    }
}
