//! In-memory store implementation.
//!
//! Mirrors the PostgreSQL store's atomicity semantics without a database:
//! a schema-update unit is validated against a scratch copy of the schema
//! and committed only when every part of it succeeded. Used by tests and
//! the CLI dry-run path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{CatalogueStore, JournalRow, ReminderPolicyRecord, SchemaUpdateUnit};
use crate::audit::AuditEvent;
use crate::catalogue::AdminRuleSet;
use crate::error::{StoreError, StoreResult};
use crate::planner::{SchemaSnapshot, TableAction};

#[derive(Default)]
struct MemoryState {
    /// table name -> column names
    tables: SchemaSnapshot,
    rule_sets: Vec<AdminRuleSet>,
    /// (scope, metric slug) -> current policy
    reminder_policies: BTreeMap<(String, String), ReminderPolicyRecord>,
    events: Vec<AuditEvent>,
    rows: BTreeMap<String, Vec<(Uuid, JournalRow)>>,
}

/// In-memory [`CatalogueStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_next_schema_update: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `apply_schema_update` fail after partial work, to
    /// exercise the rollback path.
    pub fn fail_next_schema_update(&self) {
        self.fail_next_schema_update.store(true, Ordering::SeqCst);
    }

    /// Rows currently stored for a table. Test helper.
    pub fn rows(&self, table: &str) -> Vec<(Uuid, JournalRow)> {
        self.state
            .lock()
            .expect("memory store poisoned")
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Current reminder policy for one metric. Test helper.
    pub fn reminder_policy(&self, scope: &str, slug: &str) -> Option<ReminderPolicyRecord> {
        self.state
            .lock()
            .expect("memory store poisoned")
            .reminder_policies
            .get(&(scope.to_string(), slug.to_string()))
            .cloned()
    }
}

#[async_trait]
impl CatalogueStore for MemoryStore {
    async fn schema_snapshot(&self) -> StoreResult<SchemaSnapshot> {
        Ok(self.state.lock().expect("memory store poisoned").tables.clone())
    }

    async fn current_rule_set_version(&self, scope: &str) -> StoreResult<i64> {
        let state = self.state.lock().expect("memory store poisoned");
        Ok(state
            .rule_sets
            .iter()
            .filter(|rs| rs.scope == scope)
            .map(|rs| rs.version)
            .max()
            .unwrap_or(0))
    }

    async fn apply_schema_update(&self, unit: SchemaUpdateUnit) -> StoreResult<()> {
        let mut state = self.state.lock().expect("memory store poisoned");

        if self.fail_next_schema_update.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Schema {
                table: unit
                    .actions
                    .first()
                    .map(|a| a.table().to_string())
                    .unwrap_or_default(),
                message: "injected schema failure".to_string(),
            });
        }

        if state
            .rule_sets
            .iter()
            .any(|rs| rs.scope == unit.rule_set.scope && rs.version == unit.rule_set.version)
        {
            return Err(StoreError::VersionConflict {
                scope: unit.rule_set.scope.clone(),
                version: unit.rule_set.version,
            });
        }

        // Validate every action against a scratch copy first so a failure
        // half-way leaves the committed state untouched.
        let mut tables = state.tables.clone();
        for action in &unit.actions {
            match action {
                TableAction::CreateTable { table, columns } => {
                    if tables.contains_key(table) {
                        return Err(StoreError::Schema {
                            table: table.clone(),
                            message: "table already exists".to_string(),
                        });
                    }
                    tables.insert(
                        table.clone(),
                        columns.iter().map(|c| c.name.clone()).collect(),
                    );
                }
                TableAction::AlterTableAddColumns { table, columns } => {
                    let existing = tables.get_mut(table).ok_or_else(|| StoreError::Schema {
                        table: table.clone(),
                        message: "cannot alter unknown table".to_string(),
                    })?;
                    for column in columns {
                        if !existing.insert(column.name.clone()) {
                            return Err(StoreError::Schema {
                                table: table.clone(),
                                message: format!("column '{}' already exists", column.name),
                            });
                        }
                    }
                }
                TableAction::NoChangeDetected { table } => {
                    if !tables.contains_key(table) {
                        return Err(StoreError::Schema {
                            table: table.clone(),
                            message: "no-change recorded for unknown table".to_string(),
                        });
                    }
                }
            }
        }

        state.tables = tables;
        for policy in unit.reminder_policies {
            state
                .reminder_policies
                .insert((policy.scope.clone(), policy.metric_slug.clone()), policy);
        }
        state.rule_sets.push(unit.rule_set);
        state.events.extend(unit.events);
        Ok(())
    }

    async fn append_event(&self, event: &AuditEvent) -> StoreResult<()> {
        self.state
            .lock()
            .expect("memory store poisoned")
            .events
            .push(event.clone());
        Ok(())
    }

    async fn insert_entry(&self, table: &str, row: &JournalRow) -> StoreResult<Uuid> {
        let mut state = self.state.lock().expect("memory store poisoned");
        let columns = state.tables.get(table).ok_or_else(|| StoreError::Insert {
            table: table.to_string(),
            message: "unknown table".to_string(),
        })?;
        for column in row.keys() {
            if !columns.contains(column) {
                return Err(StoreError::Insert {
                    table: table.to_string(),
                    message: format!("unknown column '{column}'"),
                });
            }
        }
        let entry_id = Uuid::new_v4();
        state
            .rows
            .entry(table.to_string())
            .or_default()
            .push((entry_id, row.clone()));
        Ok(entry_id)
    }

    async fn events(&self) -> StoreResult<Vec<AuditEvent>> {
        Ok(self.state.lock().expect("memory store poisoned").events.clone())
    }

    async fn rule_set_history(&self, scope: &str) -> StoreResult<Vec<AdminRuleSet>> {
        let state = self.state.lock().expect("memory store poisoned");
        let mut history: Vec<AdminRuleSet> = state
            .rule_sets
            .iter()
            .filter(|rs| rs.scope == scope)
            .cloned()
            .collect();
        history.sort_by_key(|rs| rs.version);
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{ParsedCatalogue, RetentionPolicy};
    use crate::planner::{metadata_columns, ColumnSpec};

    fn empty_catalogue() -> ParsedCatalogue {
        ParsedCatalogue {
            metrics: Vec::new(),
            retention: RetentionPolicy::default(),
            confidence: 0.0,
            warnings: Vec::new(),
            rule_set_id: None,
            admin_id: None,
        }
    }

    fn create_unit(scope: &str, version: i64, table: &str) -> SchemaUpdateUnit {
        SchemaUpdateUnit {
            rule_set: AdminRuleSet::new(scope, version, empty_catalogue(), None),
            actions: vec![TableAction::CreateTable {
                table: table.to_string(),
                columns: metadata_columns(),
            }],
            reminder_policies: Vec::new(),
            events: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_apply_then_snapshot() {
        let store = MemoryStore::new();
        store
            .apply_schema_update(create_unit("tenant-a", 1, "journal_mood"))
            .await
            .unwrap();

        let snapshot = store.schema_snapshot().await.unwrap();
        assert!(snapshot.contains_key("journal_mood"));
        assert_eq!(store.current_rule_set_version("tenant-a").await.unwrap(), 1);
        assert_eq!(store.current_rule_set_version("tenant-b").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_version_conflict_rejected() {
        let store = MemoryStore::new();
        store
            .apply_schema_update(create_unit("tenant-a", 1, "journal_mood"))
            .await
            .unwrap();
        let err = store
            .apply_schema_update(create_unit("tenant-a", 1, "journal_sleep"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn test_failed_unit_leaves_no_partial_state() {
        let store = MemoryStore::new();
        store
            .apply_schema_update(create_unit("tenant-a", 1, "journal_mood"))
            .await
            .unwrap();

        // Second unit creates one table then trips over an existing one.
        let mut unit = create_unit("tenant-a", 2, "journal_sleep");
        unit.actions.push(TableAction::CreateTable {
            table: "journal_mood".to_string(),
            columns: metadata_columns(),
        });
        let err = store.apply_schema_update(unit).await.unwrap_err();
        assert!(matches!(err, StoreError::Schema { .. }));

        let snapshot = store.schema_snapshot().await.unwrap();
        assert!(!snapshot.contains_key("journal_sleep"));
        assert_eq!(store.current_rule_set_version("tenant-a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_entry_checks_columns() {
        let store = MemoryStore::new();
        let mut unit = create_unit("tenant-a", 1, "journal_mood");
        if let TableAction::CreateTable { columns, .. } = &mut unit.actions[0] {
            columns.push(ColumnSpec {
                name: "rating".to_string(),
                physical_type: "INTEGER".to_string(),
                nullable: false,
                enum_values: None,
                primary_key: false,
                default_sql: None,
            });
        }
        store.apply_schema_update(unit).await.unwrap();

        let mut row = JournalRow::new();
        row.insert("rating".to_string(), super::super::ColumnValue::Integer(7));
        let entry_id = store.insert_entry("journal_mood", &row).await.unwrap();
        assert_eq!(store.rows("journal_mood")[0].0, entry_id);

        let mut bad = JournalRow::new();
        bad.insert("bogus".to_string(), super::super::ColumnValue::Integer(1));
        let err = store.insert_entry("journal_mood", &bad).await.unwrap_err();
        assert!(matches!(err, StoreError::Insert { .. }));
    }
}
