//! Attribute values and type coercion.
//!
//! Payload scalars arrive as untyped JSON. Each attribute mapping declares an
//! [`AttributeType`]; [`coerce`] converts the raw value into a [`FieldValue`] of
//! that type, or reports that it cannot. Every type has a default value used
//! when a key is missing, null, or not convertible.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a mapped attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    /// Raw JSON, copied without conversion.
    #[default]
    Json,
}

enum_from_str!(AttributeType, [
    String => "string",
    Integer => "integer",
    Float => "float",
    Boolean => "boolean",
    Date => "date",
    Json => "json",
]);

impl AttributeType {
    /// Value an attribute of this type takes when the payload has nothing usable.
    pub fn default_value(&self) -> FieldValue {
        match self {
            AttributeType::String => FieldValue::String(String::new()),
            AttributeType::Integer => FieldValue::Integer(0),
            AttributeType::Float => FieldValue::Float(0.0),
            AttributeType::Boolean => FieldValue::Bool(false),
            AttributeType::Date | AttributeType::Json => FieldValue::Null,
        }
    }
}

/// A typed attribute value exchanged with [`Mappable`](crate::object::Mappable) objects.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    Json(Value),
}

impl FieldValue {
    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::Date(_) => "date",
            FieldValue::Json(_) => "json",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Render as JSON. Dates use `format` when given, RFC 3339 otherwise.
    pub fn to_json(&self, format: Option<&str>) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Date(dt) => Value::String(format_date(dt, format)),
            FieldValue::Json(v) => v.clone(),
        }
    }

    /// Interpret an arbitrary JSON value without a declared type.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
            },
            Value::String(s) => FieldValue::String(s.clone()),
            other => FieldValue::Json(other.clone()),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json(None)),
        }
    }
}

/// Short name of a JSON value's shape, used in diagnostics.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert a raw payload value to `target`.
///
/// Returns `None` when the value is present but not convertible. Null input is
/// never convertible here; callers treat null as an absent key.
pub fn coerce(raw: &Value, target: AttributeType, format: Option<&str>) -> Option<FieldValue> {
    match target {
        AttributeType::Json => match raw {
            Value::Null => None,
            other => Some(FieldValue::Json(other.clone())),
        },
        AttributeType::String => match raw {
            Value::String(s) => Some(FieldValue::String(s.clone())),
            Value::Number(n) => Some(FieldValue::String(n.to_string())),
            Value::Bool(b) => Some(FieldValue::String(b.to_string())),
            _ => None,
        },
        AttributeType::Integer => coerce_integer(raw).map(FieldValue::Integer),
        AttributeType::Float => match raw {
            Value::Number(n) => n.as_f64().map(FieldValue::Float),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(FieldValue::Float),
            _ => None,
        },
        AttributeType::Boolean => match raw {
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(FieldValue::Bool(false)),
                Some(1) => Some(FieldValue::Bool(true)),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(FieldValue::Bool(true)),
                "false" | "no" | "0" => Some(FieldValue::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        AttributeType::Date => coerce_date(raw, format).map(FieldValue::Date),
    }
}

fn coerce_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn coerce_date(raw: &Value, format: Option<&str>) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => {
            let secs = n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?;
            DateTime::<Utc>::from_timestamp(secs, 0)
        }
        Value::String(s) => parse_date(s.trim(), format),
        _ => None,
    }
}

fn parse_date(s: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(fmt) = format {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
        return NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_date(dt: &DateTime<Utc>, format: Option<&str>) -> String {
    match format {
        Some(fmt) if is_valid_date_format(fmt) => dt.format(fmt).to_string(),
        _ => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Whether `fmt` is a strftime string chrono can render without panicking.
pub fn is_valid_date_format(fmt: &str) -> bool {
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

/// Conversion out of a [`FieldValue`] into a concrete field type.
///
/// The error is the name of the expected type, used in diagnostics.
pub trait FromFieldValue: Sized {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str>;
}

impl FromFieldValue for i64 {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str> {
        match value {
            FieldValue::Integer(i) => Ok(i),
            _ => Err("integer"),
        }
    }
}

impl FromFieldValue for i32 {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str> {
        match value {
            FieldValue::Integer(i) => i32::try_from(i).map_err(|_| "i32"),
            _ => Err("i32"),
        }
    }
}

impl FromFieldValue for u64 {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str> {
        match value {
            FieldValue::Integer(i) => u64::try_from(i).map_err(|_| "u64"),
            _ => Err("u64"),
        }
    }
}

impl FromFieldValue for f64 {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str> {
        match value {
            FieldValue::Float(f) => Ok(f),
            FieldValue::Integer(i) => Ok(i as f64),
            _ => Err("float"),
        }
    }
}

impl FromFieldValue for bool {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str> {
        match value {
            FieldValue::Bool(b) => Ok(b),
            _ => Err("boolean"),
        }
    }
}

impl FromFieldValue for String {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str> {
        match value {
            FieldValue::String(s) => Ok(s),
            _ => Err("string"),
        }
    }
}

impl FromFieldValue for DateTime<Utc> {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str> {
        match value {
            FieldValue::Date(dt) => Ok(dt),
            _ => Err("date"),
        }
    }
}

impl FromFieldValue for Value {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str> {
        Ok(value.to_json(None))
    }
}

impl<T: FromFieldValue> FromFieldValue for Option<T> {
    fn from_field_value(value: FieldValue) -> Result<Self, &'static str> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field_value(other).map(Some),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(FieldValue::Integer)
            .unwrap_or(FieldValue::Float(value as f64))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            other => FieldValue::Json(other),
        }
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
