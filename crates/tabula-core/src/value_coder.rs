//! Value coercion between the three representations of a cell
//!
//! - **display**: read-only text shown in the grid
//! - **input**: the edit buffer held while a field is being typed
//! - **submission**: the value sent over the wire
//!
//! Display and input conversions never fail; when a value cannot be
//! formatted for its column type they fall back to the raw text. Submission
//! only fails for malformed JSON. Everything else coerces silently, required
//! and unique constraints are the backend's business.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Number, Value};

use crate::error::{CoreError, CoreResult};
use crate::types::{ColumnDefinition, ColumnType, FieldMap};

/// Text shown for absent values
pub const NULL_DISPLAY: &str = "NULL";

const DISPLAY_DATE_FORMAT: &str = "%b %-d, %Y, %I:%M %p";
const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Render a value for read-only display
pub fn format_for_display(value: &Value, column_type: ColumnType) -> String {
    if value.is_null() {
        return NULL_DISPLAY.to_string();
    }

    match column_type {
        ColumnType::Boolean => {
            if is_truthy(value) {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        ColumnType::Json => format_json(value),
        ColumnType::Date => match parse_date(value) {
            Some(date) => date.format(DISPLAY_DATE_FORMAT).to_string(),
            None => stringify(value),
        },
        ColumnType::String | ColumnType::Number => stringify(value),
    }
}

/// Render a value into an edit buffer.
///
/// Booleans are edited through a toggle and never go through a buffer; they
/// still get a `true`/`false` rendering here so callers need no special case.
pub fn format_for_input(value: &Value, column_type: ColumnType) -> String {
    if value.is_null() {
        return String::new();
    }

    match column_type {
        ColumnType::Json => format_json(value),
        ColumnType::Date => match parse_date(value) {
            Some(date) => date.format(INPUT_DATE_FORMAT).to_string(),
            None => stringify(value),
        },
        ColumnType::Boolean => is_truthy(value).to_string(),
        ColumnType::String | ColumnType::Number => stringify(value),
    }
}

/// Coerce a single edited value into its wire form
pub fn coerce_for_submission(column: &ColumnDefinition, value: &Value) -> CoreResult<Value> {
    let coerced = match column.column_type {
        ColumnType::Number => coerce_number(&column.name, value),
        ColumnType::Json => coerce_json(&column.name, value)?,
        ColumnType::Boolean => Value::Bool(is_truthy(value)),
        ColumnType::String | ColumnType::Date => coerce_text(value),
    };
    Ok(coerced)
}

/// Coerce a full row for creation. Every column is emitted; fields missing
/// from `data` coerce from null.
pub fn coerce_row(columns: &[ColumnDefinition], data: &FieldMap) -> CoreResult<FieldMap> {
    let mut clean = FieldMap::new();
    for column in columns {
        let value = data.get(&column.name).unwrap_or(&Value::Null);
        clean.insert(column.name.clone(), coerce_for_submission(column, value)?);
    }
    Ok(clean)
}

/// Coerce a partial patch for an update. Only the fields present in the
/// patch are emitted, so untouched columns keep their server values.
pub fn coerce_patch(columns: &[ColumnDefinition], patch: &FieldMap) -> CoreResult<FieldMap> {
    let mut clean = FieldMap::new();
    for (name, value) in patch {
        let Some(column) = columns.iter().find(|c| &c.name == name) else {
            tracing::debug!(column = %name, "Dropping patch field for unknown column");
            continue;
        };
        clean.insert(name.clone(), coerce_for_submission(column, value)?);
    }
    Ok(clean)
}

/// Whether a field counts as unfilled for required-column checks.
/// Booleans always hold a value.
pub fn is_field_empty(value: &Value, column_type: ColumnType) -> bool {
    match value {
        Value::Null => true,
        _ if column_type == ColumnType::Boolean => false,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn coerce_text(value: &Value) -> Value {
    match value {
        Value::String(s) if s.trim().is_empty() => Value::Null,
        other if is_truthy(other) => other.clone(),
        _ => Value::Null,
    }
}

fn coerce_number(column: &str, value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Number(_) => value.clone(),
        Value::Bool(b) => Value::from(u8::from(*b)),
        Value::String(s) if s.is_empty() => Value::Null,
        Value::String(s) => match parse_number(s.trim()) {
            Some(n) => Value::Number(n),
            None => {
                tracing::warn!(column = %column, input = %s, "Non-numeric input submitted as null");
                Value::Null
            }
        },
        Value::Array(_) | Value::Object(_) => {
            tracing::warn!(column = %column, "Structured value in number column submitted as null");
            Value::Null
        }
    }
}

fn coerce_json(column: &str, value: &Value) -> CoreResult<Value> {
    match value {
        Value::String(s) if s.is_empty() => Ok(Value::Null),
        Value::String(s) => {
            serde_json::from_str(s).map_err(|e| CoreError::InvalidFieldValue {
                column: column.to_string(),
                reason: e.to_string(),
            })
        }
        other => Ok(other.clone()),
    }
}

/// Parse numeric text. Integral inputs stay integers on the wire; anything
/// non-finite has no JSON form and yields `None`.
fn parse_number(text: &str) -> Option<Number> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    let f = text.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return Some(Number::from(f as i64));
    }
    Number::from_f64(f)
}

/// Truthiness of a raw value, as the toggle and text coercions see it
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn format_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| stringify(other)),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Interpret a cell as a point in time. Accepts RFC 3339 timestamps, naive
/// date-times, bare calendar dates (midnight UTC) and epoch milliseconds.
fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_text(s.trim()),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, INPUT_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
