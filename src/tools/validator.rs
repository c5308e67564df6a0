//! Runtime input validators derived from field definitions.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::catalogue::{FieldDefinition, FieldType};
use crate::store::ColumnValue;

/// Validator for one tool's input, derived once from its field list.
#[derive(Debug)]
pub struct FieldValidator {
    fields: Vec<FieldDefinition>,
}

impl FieldValidator {
    pub fn derive(fields: &[FieldDefinition]) -> Self {
        Self {
            fields: fields.to_vec(),
        }
    }

    /// Check type, required/optional and enum membership, returning typed
    /// values per logical field name or the full list of violations.
    pub fn validate(&self, input: &Value) -> Result<BTreeMap<String, ColumnValue>, Vec<String>> {
        let Some(object) = input.as_object() else {
            return Err(vec!["input must be a JSON object".to_string()]);
        };

        let mut violations = Vec::new();
        for key in object.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                violations.push(format!("unknown field '{key}'"));
            }
        }

        let mut values = BTreeMap::new();
        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        violations.push(format!("missing required field '{}'", field.name));
                    }
                }
                Some(value) => match check_value(field, value) {
                    Ok(column_value) => {
                        values.insert(field.name.clone(), column_value);
                    }
                    Err(violation) => violations.push(violation),
                },
            }
        }

        if violations.is_empty() {
            Ok(values)
        } else {
            Err(violations)
        }
    }
}

fn check_value(field: &FieldDefinition, value: &Value) -> Result<ColumnValue, String> {
    match field.data_type {
        FieldType::Numeric => value
            .as_f64()
            .map(ColumnValue::Number)
            .ok_or_else(|| format!("field '{}' must be a number", field.name)),
        FieldType::Integer => value
            .as_i64()
            .map(ColumnValue::Integer)
            .ok_or_else(|| format!("field '{}' must be an integer", field.name)),
        FieldType::Boolean => value
            .as_bool()
            .map(ColumnValue::Bool)
            .ok_or_else(|| format!("field '{}' must be a boolean", field.name)),
        FieldType::Text => value
            .as_str()
            .map(|s| ColumnValue::Text(s.to_string()))
            .ok_or_else(|| format!("field '{}' must be a string", field.name)),
        FieldType::Enum => {
            let text = value
                .as_str()
                .ok_or_else(|| format!("field '{}' must be a string", field.name))?;
            let allowed = field.enum_values.as_deref().unwrap_or(&[]);
            if allowed.iter().any(|v| v == text) {
                Ok(ColumnValue::Text(text.to_string()))
            } else {
                Err(format!(
                    "field '{}' must be one of [{}]",
                    field.name,
                    allowed.join(", ")
                ))
            }
        }
        FieldType::DateTime => {
            let text = value
                .as_str()
                .ok_or_else(|| format!("field '{}' must be an ISO-8601 string", field.name))?;
            DateTime::parse_from_rfc3339(text)
                .map(|ts| ColumnValue::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|_| format!("field '{}' must be an ISO-8601 timestamp", field.name))
        }
    }
}

/// Process-lifetime memoization of derived validators, keyed by tool id.
///
/// Derivation is pure and deterministic, so a concurrent race only risks
/// duplicate equivalent work, never divergent validators. Constructed at
/// startup and passed by reference; `clear` exists for test isolation.
#[derive(Debug, Default)]
pub struct ValidatorCache {
    inner: RwLock<HashMap<String, Arc<FieldValidator>>>,
}

impl ValidatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached validator for `tool_id`, deriving it on first use.
    pub fn get_or_derive(&self, tool_id: &str, fields: &[FieldDefinition]) -> Arc<FieldValidator> {
        if let Some(validator) = self
            .inner
            .read()
            .expect("validator cache poisoned")
            .get(tool_id)
        {
            return validator.clone();
        }
        let derived = Arc::new(FieldValidator::derive(fields));
        self.inner
            .write()
            .expect("validator cache poisoned")
            .entry(tool_id.to_string())
            .or_insert(derived)
            .clone()
    }

    pub fn clear(&self) {
        self.inner
            .write()
            .expect("validator cache poisoned")
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("validator cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
