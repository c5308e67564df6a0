//! Parsed catalogues and persisted rule-set versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metric::MetricDefinition;
use super::policy::RetentionPolicy;
use crate::error::CatalogueResult;

/// The structured result of one parse call.
///
/// Produced fresh on every call and never mutated in place; the executor
/// persists an accepted catalogue as a new [`AdminRuleSet`] version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCatalogue {
    pub metrics: Vec<MetricDefinition>,
    pub retention: RetentionPolicy,
    /// Heuristic confidence, always within [0, 1].
    pub confidence: f64,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
}

impl ParsedCatalogue {
    /// Validate the shape of every metric plus the retention policy.
    pub fn validate(&self) -> CatalogueResult<()> {
        self.retention.validate()?;
        for metric in &self.metrics {
            metric.validate()?;
        }
        Ok(())
    }

    pub fn metric(&self, slug: &str) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|m| m.slug == slug)
    }
}

/// A persisted, versioned catalogue. Versions are immutable once written
/// and monotonically numbered per scope; history is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRuleSet {
    pub rule_set_id: Uuid,
    /// Tenant / admin rule-set scope this version belongs to.
    pub scope: String,
    pub version: i64,
    pub catalogue: ParsedCatalogue,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl AdminRuleSet {
    pub fn new(
        scope: impl Into<String>,
        version: i64,
        catalogue: ParsedCatalogue,
        created_by: Option<String>,
    ) -> Self {
        Self {
            rule_set_id: Uuid::new_v4(),
            scope: scope.into(),
            version,
            catalogue,
            created_at: Utc::now(),
            created_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_catalogue_validates() {
        let catalogue = ParsedCatalogue {
            metrics: Vec::new(),
            retention: RetentionPolicy::default(),
            confidence: 0.0,
            warnings: Vec::new(),
            rule_set_id: None,
            admin_id: None,
        };
        assert!(catalogue.validate().is_ok());
    }

    #[test]
    fn test_rule_set_carries_scope_and_version() {
        let catalogue = ParsedCatalogue {
            metrics: Vec::new(),
            retention: RetentionPolicy::default(),
            confidence: 0.0,
            warnings: Vec::new(),
            rule_set_id: None,
            admin_id: None,
        };
        let rule_set = AdminRuleSet::new("tenant-a", 3, catalogue, Some("admin-1".into()));
        assert_eq!(rule_set.scope, "tenant-a");
        assert_eq!(rule_set.version, 3);
        assert_eq!(rule_set.created_by.as_deref(), Some("admin-1"));
    }
}
