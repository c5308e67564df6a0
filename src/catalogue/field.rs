//! Field definitions and their logical data types.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogueError, CatalogueResult};

/// Pattern every logical field name must match.
pub const FIELD_NAME_PATTERN: &str = "^[a-z_][a-z0-9_]*$";

fn field_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FIELD_NAME_PATTERN).expect("valid field name pattern"))
}

/// Logical data type of a tracked field.
///
/// The vocabulary is closed: anything else arriving from a stored
/// configuration document fails deserialization with `UNSUPPORTED_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Numeric,
    Integer,
    Boolean,
    Text,
    Enum,
    DateTime,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Numeric => "numeric",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Text => "text",
            FieldType::Enum => "enum",
            FieldType::DateTime => "datetime",
        }
    }

    pub fn parse(value: &str) -> Option<FieldType> {
        match value {
            "numeric" => Some(FieldType::Numeric),
            "integer" => Some(FieldType::Integer),
            "boolean" => Some(FieldType::Boolean),
            "text" => Some(FieldType::Text),
            "enum" => Some(FieldType::Enum),
            "datetime" => Some(FieldType::DateTime),
            _ => None,
        }
    }

    /// Physical column type used by the planner.
    pub fn physical_type(&self) -> &'static str {
        match self {
            FieldType::Numeric => "NUMERIC(10,2)",
            FieldType::Integer => "INTEGER",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Text => "TEXT",
            // Enum values are carried as a check constraint on TEXT.
            FieldType::Enum => "TEXT",
            FieldType::DateTime => "TIMESTAMPTZ",
        }
    }

    /// JSON schema type used in generated tool input schemas.
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldType::Numeric => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Text | FieldType::Enum | FieldType::DateTime => "string",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = CatalogueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::parse(s).ok_or_else(|| CatalogueError::UnsupportedType {
            field: "data_type".to_string(),
            value: s.to_string(),
        })
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        FieldType::parse(&value).ok_or_else(|| {
            de::Error::custom(format!("UNSUPPORTED_TYPE: unrecognized data type '{value}'"))
        })
    }
}

/// One tracked field of a metric. Immutable once part of a persisted
/// rule set version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    pub data_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            data_type,
            unit: None,
            enum_values: None,
            required: true,
            example: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Structural validation: name pattern and enum-value coherence.
    pub fn validate(&self) -> CatalogueResult<()> {
        if !field_name_regex().is_match(&self.name) {
            return Err(CatalogueError::validation(
                format!("field '{}'", self.name),
                format!("name must match {FIELD_NAME_PATTERN}"),
            ));
        }
        match (&self.data_type, &self.enum_values) {
            (FieldType::Enum, None) => Err(CatalogueError::validation(
                format!("field '{}'", self.name),
                "enum field requires at least one allowed value",
            )),
            (FieldType::Enum, Some(values)) if values.is_empty() => {
                Err(CatalogueError::validation(
                    format!("field '{}'", self.name),
                    "enum field requires at least one allowed value",
                ))
            }
            (_, Some(_)) if self.data_type != FieldType::Enum => Err(CatalogueError::validation(
                format!("field '{}'", self.name),
                "enum values are only meaningful for enum fields",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_round_trip() {
        for name in ["numeric", "integer", "boolean", "text", "enum", "datetime"] {
            let parsed: FieldType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), name);
        }
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let err = "decimal128".parse::<FieldType>().unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_TYPE");

        let err = serde_json::from_str::<FieldType>("\"blob\"").unwrap_err();
        assert!(err.to_string().contains("UNSUPPORTED_TYPE"));
    }

    #[test]
    fn test_field_name_pattern() {
        let good = FieldDefinition::new("water_ml", "Water (ml)", FieldType::Numeric);
        assert!(good.validate().is_ok());

        let bad = FieldDefinition::new("Water-ML", "Water", FieldType::Numeric);
        let err = bad.validate().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_enum_requires_values() {
        let field = FieldDefinition::new("source", "Source", FieldType::Enum);
        assert_eq!(field.validate().unwrap_err().code(), "VALIDATION_ERROR");

        let field = field.with_enum_values(["tap", "bottled"]);
        assert!(field.validate().is_ok());
    }

    #[test]
    fn test_physical_type_mapping() {
        assert_eq!(FieldType::Numeric.physical_type(), "NUMERIC(10,2)");
        assert_eq!(FieldType::Integer.physical_type(), "INTEGER");
        assert_eq!(FieldType::Boolean.physical_type(), "BOOLEAN");
        assert_eq!(FieldType::Text.physical_type(), "TEXT");
        assert_eq!(FieldType::Enum.physical_type(), "TEXT");
        assert_eq!(FieldType::DateTime.physical_type(), "TIMESTAMPTZ");
    }
}
