//! Table Change Planner
//!
//! Pure translation of a parsed catalogue plus a schema snapshot into an
//! ordered, strictly additive plan of table actions. The action vocabulary
//! has no destructive member, so unsafe evolution is unrepresentable rather
//! than merely forbidden. A naming or typing violation rejects only the
//! offending metric; sibling metrics in the same catalogue still plan.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalogue::{FieldDefinition, FieldType, MetricDefinition, ParsedCatalogue};
use crate::error::{CatalogueError, CatalogueResult};

/// Pattern shared by physical table and column names.
pub const TABLE_NAME_PATTERN: &str = "^[a-z][a-z0-9_]*$";

pub const MAX_TABLE_NAME_LEN: usize = 63;

/// Prefixes reserved for core system tables; journal tables may not use them.
pub const RESERVED_PREFIXES: &[&str] = &["system_", "admin_", "meta_"];

pub const ENTRY_ID_COLUMN: &str = "entry_id";
pub const OWNER_COLUMN: &str = "owner_id";
pub const RECORDED_AT_COLUMN: &str = "recorded_at";

fn table_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TABLE_NAME_PATTERN).expect("valid table name pattern"))
}

/// Existing physical schema: table name to its known column names.
pub type SchemaSnapshot = BTreeMap<String, BTreeSet<String>>;

/// Physical column description carried by plan actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub physical_type: String,
    pub nullable: bool,
    /// Allowed values for checked text columns derived from enum fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub primary_key: bool,
    /// SQL default expression. Only ever set on planner-owned metadata
    /// columns, never from admin input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sql: Option<String>,
}

impl ColumnSpec {
    fn field(name: &str, physical_type: &str, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            physical_type: physical_type.to_string(),
            nullable,
            enum_values: None,
            primary_key: false,
            default_sql: None,
        }
    }
}

/// One additive schema action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TableAction {
    CreateTable {
        table: String,
        columns: Vec<ColumnSpec>,
    },
    AlterTableAddColumns {
        table: String,
        columns: Vec<ColumnSpec>,
    },
    NoChangeDetected {
        table: String,
    },
}

impl TableAction {
    pub fn table(&self) -> &str {
        match self {
            TableAction::CreateTable { table, .. }
            | TableAction::AlterTableAddColumns { table, .. }
            | TableAction::NoChangeDetected { table } => table,
        }
    }

    /// Wire tag, matching the serialized `action` field.
    pub fn kind(&self) -> &'static str {
        match self {
            TableAction::CreateTable { .. } => "create_table",
            TableAction::AlterTableAddColumns { .. } => "alter_table_add_columns",
            TableAction::NoChangeDetected { .. } => "no_change_detected",
        }
    }
}

/// Ordered sequence of additive actions for one catalogue update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableActionPlan {
    pub actions: Vec<TableAction>,
}

impl TableActionPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// True when no action would change the physical schema.
    pub fn is_no_change(&self) -> bool {
        self.actions
            .iter()
            .all(|a| matches!(a, TableAction::NoChangeDetected { .. }))
    }
}

/// Result of planning one catalogue: the plan plus per-metric rejections.
/// The caller decides whether any rejection blocks the executor run.
#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: TableActionPlan,
    pub rejections: Vec<CatalogueError>,
}

/// Pure planner; no I/O, freely concurrent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableChangePlanner;

impl TableChangePlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan schema actions for every metric in the catalogue.
    pub fn plan(&self, catalogue: &ParsedCatalogue, snapshot: &SchemaSnapshot) -> PlanOutcome {
        let mut actions = Vec::new();
        let mut rejections = Vec::new();
        let mut seen_slugs = BTreeSet::new();
        let mut claimed_tables = BTreeSet::new();

        for metric in &catalogue.metrics {
            match plan_metric(metric, snapshot, &mut seen_slugs, &mut claimed_tables) {
                Ok(action) => actions.push(action),
                Err(err) => rejections.push(err),
            }
        }

        PlanOutcome {
            plan: TableActionPlan { actions },
            rejections,
        }
    }
}

fn plan_metric(
    metric: &MetricDefinition,
    snapshot: &SchemaSnapshot,
    seen_slugs: &mut BTreeSet<String>,
    claimed_tables: &mut BTreeSet<String>,
) -> CatalogueResult<TableAction> {
    metric.validate()?;

    if !seen_slugs.insert(metric.slug.clone()) {
        return Err(CatalogueError::SlugConflict {
            slug: metric.slug.clone(),
            reason: "another metric in this catalogue uses the same slug".to_string(),
        });
    }

    let table = metric.table_name();
    validate_table_name(&table)?;
    if !claimed_tables.insert(table.clone()) {
        return Err(CatalogueError::SlugConflict {
            slug: metric.slug.clone(),
            reason: format!("another metric in this catalogue maps to table '{table}'"),
        });
    }

    let field_columns = metric
        .fields
        .iter()
        .map(column_spec)
        .collect::<CatalogueResult<Vec<_>>>()?;

    match snapshot.get(&table) {
        None => {
            let mut columns = metadata_columns();
            columns.extend(field_columns);
            Ok(TableAction::CreateTable { table, columns })
        }
        Some(existing) => {
            let missing: Vec<ColumnSpec> = field_columns
                .into_iter()
                .filter(|column| !existing.contains(&column.name))
                .collect();
            if missing.is_empty() {
                Ok(TableAction::NoChangeDetected { table })
            } else {
                Ok(TableAction::AlterTableAddColumns {
                    table,
                    columns: missing,
                })
            }
        }
    }
}

/// Validate a physical table name: pattern, length, reserved prefixes.
pub fn validate_table_name(name: &str) -> CatalogueResult<()> {
    if !table_name_regex().is_match(name) {
        return Err(CatalogueError::validation(
            format!("table '{name}'"),
            format!("name must match {TABLE_NAME_PATTERN}"),
        ));
    }
    if name.len() > MAX_TABLE_NAME_LEN {
        return Err(CatalogueError::validation(
            format!("table '{name}'"),
            format!("name exceeds {MAX_TABLE_NAME_LEN} characters"),
        ));
    }
    for prefix in RESERVED_PREFIXES {
        if name.starts_with(prefix) {
            return Err(CatalogueError::validation(
                format!("table '{name}'"),
                format!("prefix '{prefix}' is reserved for system tables"),
            ));
        }
    }
    Ok(())
}

/// Validate a physical column name.
pub fn validate_column_name(name: &str) -> CatalogueResult<()> {
    if !table_name_regex().is_match(name) {
        return Err(CatalogueError::validation(
            format!("column '{name}'"),
            format!("name must match {TABLE_NAME_PATTERN}"),
        ));
    }
    Ok(())
}

fn column_spec(field: &FieldDefinition) -> CatalogueResult<ColumnSpec> {
    validate_column_name(&field.name)?;
    if [ENTRY_ID_COLUMN, OWNER_COLUMN, RECORDED_AT_COLUMN].contains(&field.name.as_str()) {
        return Err(CatalogueError::validation(
            format!("field '{}'", field.name),
            "name collides with a metadata column",
        ));
    }

    let mut column = ColumnSpec::field(
        &field.name,
        field.data_type.physical_type(),
        !field.required,
    );
    if field.data_type == FieldType::Enum {
        column.enum_values = field.enum_values.clone();
    }
    Ok(column)
}

/// Conventional metadata columns every journal table carries.
pub fn metadata_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec {
            name: ENTRY_ID_COLUMN.to_string(),
            physical_type: "UUID".to_string(),
            nullable: false,
            enum_values: None,
            primary_key: true,
            default_sql: Some("gen_random_uuid()".to_string()),
        },
        ColumnSpec {
            name: OWNER_COLUMN.to_string(),
            physical_type: "UUID".to_string(),
            nullable: true,
            enum_values: None,
            primary_key: false,
            default_sql: None,
        },
        ColumnSpec {
            name: RECORDED_AT_COLUMN.to_string(),
            physical_type: "TIMESTAMPTZ".to_string(),
            nullable: false,
            enum_values: None,
            primary_key: false,
            default_sql: Some("NOW()".to_string()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{ReminderPolicy, RetentionPolicy};

    fn metric(slug: &str, fields: Vec<FieldDefinition>) -> MetricDefinition {
        MetricDefinition {
            slug: slug.to_string(),
            display_name: slug.to_string(),
            description: String::new(),
            fields,
            reminder_policy: ReminderPolicy::default(),
            analytics_tags: Default::default(),
        }
    }

    fn catalogue(metrics: Vec<MetricDefinition>) -> ParsedCatalogue {
        ParsedCatalogue {
            metrics,
            retention: RetentionPolicy::default(),
            confidence: 0.9,
            warnings: Vec::new(),
            rule_set_id: None,
            admin_id: None,
        }
    }

    fn quantity() -> FieldDefinition {
        FieldDefinition::new("quantity", "Quantity", FieldType::Numeric)
    }

    #[test]
    fn test_create_table_includes_metadata_columns() {
        let planner = TableChangePlanner::new();
        let outcome = planner.plan(
            &catalogue(vec![metric("water-intake", vec![quantity()])]),
            &SchemaSnapshot::new(),
        );

        assert!(outcome.rejections.is_empty());
        assert_eq!(outcome.plan.actions.len(), 1);
        match &outcome.plan.actions[0] {
            TableAction::CreateTable { table, columns } => {
                assert_eq!(table, "journal_water_intake");
                let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(
                    names,
                    vec!["entry_id", "owner_id", "recorded_at", "quantity"]
                );
            }
            other => panic!("expected create_table, got {other:?}"),
        }
    }

    #[test]
    fn test_existing_table_diffs_to_alter_or_no_change() {
        let planner = TableChangePlanner::new();
        let mut snapshot = SchemaSnapshot::new();
        snapshot.insert(
            "journal_sleep".to_string(),
            ["entry_id", "owner_id", "recorded_at", "duration"]
                .into_iter()
                .map(String::from)
                .collect(),
        );

        let quality = FieldDefinition::new("quality", "Quality", FieldType::Enum)
            .with_enum_values(["poor", "good"]);
        let duration = FieldDefinition::new("duration", "Duration", FieldType::Numeric);

        let outcome = planner.plan(
            &catalogue(vec![metric("sleep", vec![duration.clone(), quality])]),
            &snapshot,
        );
        match &outcome.plan.actions[0] {
            TableAction::AlterTableAddColumns { table, columns } => {
                assert_eq!(table, "journal_sleep");
                assert_eq!(columns.len(), 1);
                assert_eq!(columns[0].name, "quality");
                assert_eq!(columns[0].enum_values.as_ref().unwrap().len(), 2);
            }
            other => panic!("expected alter_table_add_columns, got {other:?}"),
        }

        let outcome = planner.plan(&catalogue(vec![metric("sleep", vec![duration])]), &snapshot);
        assert!(matches!(
            outcome.plan.actions[0],
            TableAction::NoChangeDetected { .. }
        ));
        assert!(outcome.plan.is_no_change());
    }

    #[test]
    fn test_reserved_prefixes_rejected() {
        for name in ["admin_overrides", "system_x", "meta_audit"] {
            let err = validate_table_name(name).unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }
        assert!(validate_table_name("journal_blood_pressure").is_ok());
    }

    #[test]
    fn test_table_name_length_limit() {
        let name = format!("journal_{}", "x".repeat(MAX_TABLE_NAME_LEN));
        let err = validate_table_name(&name).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_duplicate_slug_rejected_sibling_proceeds() {
        let planner = TableChangePlanner::new();
        let outcome = planner.plan(
            &catalogue(vec![
                metric("water-intake", vec![quantity()]),
                metric("water-intake", vec![quantity()]),
                metric("mood", vec![quantity()]),
            ]),
            &SchemaSnapshot::new(),
        );

        assert_eq!(outcome.plan.actions.len(), 2);
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].code(), "CONFLICT_SLUG");
    }

    #[test]
    fn test_leading_underscore_field_fails_column_pattern() {
        // `_hidden` is a valid logical field name but not a valid column.
        let planner = TableChangePlanner::new();
        let field = FieldDefinition::new("_hidden", "Hidden", FieldType::Text);
        let outcome = planner.plan(
            &catalogue(vec![metric("mood", vec![field])]),
            &SchemaSnapshot::new(),
        );
        assert!(outcome.plan.actions.is_empty());
        assert_eq!(outcome.rejections[0].code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_metadata_column_collision_rejected() {
        let planner = TableChangePlanner::new();
        let field = FieldDefinition::new("entry_id", "Entry", FieldType::Text);
        let outcome = planner.plan(
            &catalogue(vec![metric("mood", vec![field])]),
            &SchemaSnapshot::new(),
        );
        assert_eq!(outcome.rejections[0].code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_action_tags_are_the_closed_vocabulary() {
        let actions = vec![
            TableAction::CreateTable {
                table: "journal_mood".into(),
                columns: metadata_columns(),
            },
            TableAction::AlterTableAddColumns {
                table: "journal_mood".into(),
                columns: vec![],
            },
            TableAction::NoChangeDetected {
                table: "journal_mood".into(),
            },
        ];
        for action in &actions {
            let value = serde_json::to_value(action).unwrap();
            let tag = value["action"].as_str().unwrap();
            assert!(
                ["create_table", "alter_table_add_columns", "no_change_detected"].contains(&tag)
            );
            assert_eq!(tag, action.kind());
        }
    }
}
