//! Materialized rows and the JSON <-> SQL value bridge.

use sea_orm::JsonValue;
use sea_orm::sea_query::Value;

use crate::core::Model;
use crate::errors::{Error, Result};

/// Column values of one row, keyed by column name.
pub type Attributes = serde_json::Map<String, JsonValue>;

/// Turn a JSON object into [`Attributes`].
///
/// # Errors
///
/// Returns [`Error::InvalidAttribute`] for anything but an object.
pub fn attributes(value: JsonValue) -> Result<Attributes> {
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::InvalidAttribute(format!(
            "expected an object of column values, got {other}"
        ))),
    }
}

/// A single row of a model, either loaded from the database or not yet saved.
#[derive(Debug, Clone)]
pub struct Record {
    model: &'static dyn Model,
    attributes: Attributes,
    exists: bool,
}

impl Record {
    /// Unsaved record with no attributes.
    #[must_use]
    pub fn new(model: &'static dyn Model) -> Self {
        Self {
            model,
            attributes: Attributes::new(),
            exists: false,
        }
    }

    /// Record that mirrors a stored row.
    #[must_use]
    pub fn persisted(model: &'static dyn Model, attributes: Attributes) -> Self {
        Self {
            model,
            attributes,
            exists: true,
        }
    }

    #[must_use]
    pub fn model(&self) -> &'static dyn Model {
        self.model
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.attributes.get(column)
    }

    /// Primary key value, if set and not null.
    #[must_use]
    pub fn key(&self) -> Option<&JsonValue> {
        self.get(self.model.primary_key()).filter(|v| !v.is_null())
    }

    /// Persisted and carrying a primary key.
    #[must_use]
    pub fn is_identified(&self) -> bool {
        self.exists && self.key().is_some()
    }

    pub fn set(&mut self, column: impl Into<String>, value: JsonValue) {
        self.attributes.insert(column.into(), value);
    }

    /// Merge `values` over the current attributes.
    pub fn fill(&mut self, values: &Attributes) {
        for (column, value) in values {
            self.attributes.insert(column.clone(), value.clone());
        }
    }

    /// Subset of the attributes restricted to `columns`, skipping absent ones.
    #[must_use]
    pub fn only(&self, columns: &[&str]) -> Attributes {
        columns
            .iter()
            .filter_map(|c| self.get(c).map(|v| ((*c).to_string(), v.clone())))
            .collect()
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.exists = false;
    }
}

/// Convert a JSON value to the value sea-query binds.
#[must_use]
pub fn to_sql_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::String(None),
        JsonValue::Bool(b) => Value::from(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::from(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(s) => Value::from(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => Value::Json(Some(Box::new(value.clone()))),
    }
}

/// Loose truthiness: false, null, 0, "", "0" are false.
#[must_use]
pub fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !(s.is_empty() || s == "0"),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

/// Logical negation that keeps the storage shape: booleans stay booleans,
/// numeric flags (SQLite) stay `0`/`1`.
pub(crate) fn negate(column: &str, value: &JsonValue) -> Result<JsonValue> {
    match value {
        JsonValue::Bool(b) => Ok(JsonValue::Bool(!b)),
        JsonValue::Number(_) => Ok(JsonValue::from(i64::from(!truthy(value)))),
        JsonValue::Null | JsonValue::String(_) => Ok(JsonValue::Bool(!truthy(value))),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(Error::InvalidAttribute(format!(
            "column [{column}] does not hold a boolean"
        ))),
    }
}

/// `current + sign * delta`, integer arithmetic when both sides are integers.
pub(crate) fn offset(column: &str, current: &JsonValue, delta: &JsonValue, sign: i64) -> Result<JsonValue> {
    let not_numeric = || Error::InvalidAttribute(format!("column [{column}] is not numeric"));
    let delta_n = delta.as_number().ok_or_else(not_numeric)?;
    let zero = serde_json::Number::from(0);
    let current_n = match current {
        JsonValue::Null => &zero,
        JsonValue::Number(n) => n,
        _ => return Err(not_numeric()),
    };

    if let (Some(a), Some(b)) = (current_n.as_i64(), delta_n.as_i64()) {
        return b
            .checked_mul(sign)
            .and_then(|b| a.checked_add(b))
            .map(JsonValue::from)
            .ok_or_else(|| Error::InvalidAttribute(format!("column [{column}] overflowed")));
    }

    let a = current_n.as_f64().ok_or_else(not_numeric)?;
    let b = delta_n.as_f64().ok_or_else(not_numeric)?;
    #[allow(clippy::cast_precision_loss)]
    let result = a + b * sign as f64;
    serde_json::Number::from_f64(result)
        .map(JsonValue::Number)
        .ok_or_else(not_numeric)
}
