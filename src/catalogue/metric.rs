//! Metric definitions and journal-table naming.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::field::FieldDefinition;
use super::policy::ReminderPolicy;
use crate::error::{CatalogueError, CatalogueResult};

/// Pattern every metric slug must match.
pub const SLUG_PATTERN: &str = "^[a-z][a-z0-9-]*$";

pub const MAX_SLUG_LEN: usize = 50;

fn slug_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SLUG_PATTERN).expect("valid slug pattern"))
}

/// One trackable category with its fields and reminder policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub slug: String,
    pub display_name: String,
    pub description: String,
    pub fields: Vec<FieldDefinition>,
    pub reminder_policy: ReminderPolicy,
    #[serde(default)]
    pub analytics_tags: BTreeSet<String>,
}

impl MetricDefinition {
    /// Target journal table for this metric's entries.
    pub fn table_name(&self) -> String {
        format!("journal_{}", self.slug.replace('-', "_"))
    }

    /// Structural validation: slug shape, field presence and uniqueness.
    ///
    /// Table naming (length, reserved prefixes, collisions) is the
    /// planner's concern; this only checks the metric in isolation.
    pub fn validate(&self) -> CatalogueResult<()> {
        if !slug_regex().is_match(&self.slug) {
            return Err(CatalogueError::validation(
                format!("metric '{}'", self.slug),
                format!("slug must match {SLUG_PATTERN}"),
            ));
        }
        if self.slug.len() > MAX_SLUG_LEN {
            return Err(CatalogueError::validation(
                format!("metric '{}'", self.slug),
                format!("slug exceeds {MAX_SLUG_LEN} characters"),
            ));
        }
        if self.fields.is_empty() {
            return Err(CatalogueError::validation(
                format!("metric '{}'", self.slug),
                "at least one field is required",
            ));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            field.validate()?;
            if !seen.insert(field.name.as_str()) {
                return Err(CatalogueError::validation(
                    format!("metric '{}'", self.slug),
                    format!("duplicate field name '{}'", field.name),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::field::FieldType;

    fn metric(slug: &str) -> MetricDefinition {
        MetricDefinition {
            slug: slug.to_string(),
            display_name: "Test".to_string(),
            description: String::new(),
            fields: vec![FieldDefinition::new(
                "quantity",
                "Quantity",
                FieldType::Numeric,
            )],
            reminder_policy: ReminderPolicy::default(),
            analytics_tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_table_name_mapping() {
        assert_eq!(
            metric("blood-pressure").table_name(),
            "journal_blood_pressure"
        );
        assert_eq!(metric("water-intake").table_name(), "journal_water_intake");
    }

    #[test]
    fn test_slug_shape() {
        assert!(metric("water-intake").validate().is_ok());
        assert_eq!(
            metric("Water Intake").validate().unwrap_err().code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            metric("9lives").validate().unwrap_err().code(),
            "VALIDATION_ERROR"
        );

        let long = "a".repeat(MAX_SLUG_LEN + 1);
        assert_eq!(
            metric(&long).validate().unwrap_err().code(),
            "VALIDATION_ERROR"
        );
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let mut m = metric("sleep");
        m.fields
            .push(FieldDefinition::new("quantity", "Again", FieldType::Integer));
        assert_eq!(m.validate().unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_empty_fields_rejected() {
        let mut m = metric("sleep");
        m.fields.clear();
        assert_eq!(m.validate().unwrap_err().code(), "VALIDATION_ERROR");
    }
}
