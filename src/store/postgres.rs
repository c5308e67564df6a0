//! PostgreSQL-backed store implementation.
//!
//! Core system tables live under reserved prefixes (`admin_`, `meta_`) so
//! they can never collide with journal tables or enter the write whitelist.
//! Every DDL identifier is revalidated here before it is interpolated, and
//! every DML value is bound, never concatenated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{CatalogueStore, ColumnValue, JournalRow, SchemaUpdateUnit};
use crate::audit::{ActorType, AuditEvent};
use crate::catalogue::AdminRuleSet;
use crate::error::{StoreError, StoreResult};
use crate::planner::{
    validate_column_name, validate_table_name, ColumnSpec, SchemaSnapshot, TableAction,
};

/// PostgreSQL implementation of the [`CatalogueStore`] trait.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the core system tables if they do not exist.
    pub async fn initialize_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admin_rule_sets (
                rule_set_id UUID PRIMARY KEY,
                scope VARCHAR NOT NULL,
                version BIGINT NOT NULL,
                catalogue JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                created_by VARCHAR,

                UNIQUE(scope, version)
            );

            CREATE INDEX IF NOT EXISTS idx_admin_rule_sets_scope
            ON admin_rule_sets(scope, version DESC);

            CREATE TABLE IF NOT EXISTS admin_reminder_policies (
                scope VARCHAR NOT NULL,
                metric_slug VARCHAR NOT NULL,
                schedule VARCHAR NOT NULL,
                timezone VARCHAR NOT NULL,
                escalation JSONB,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                PRIMARY KEY(scope, metric_slug)
            );

            CREATE TABLE IF NOT EXISTS meta_audit_events (
                event_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                actor_type VARCHAR NOT NULL,
                actor_id VARCHAR NOT NULL,
                event_type VARCHAR NOT NULL,
                resource_type VARCHAR NOT NULL,
                resource_ref VARCHAR NOT NULL,
                payload JSONB NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_meta_audit_events_occurred
            ON meta_audit_events(occurred_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Schema {
            table: "core system tables".to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    async fn apply_action(
        tx: &mut Transaction<'_, Postgres>,
        action: &TableAction,
    ) -> StoreResult<()> {
        match action {
            TableAction::CreateTable { table, columns } => {
                let ddl = create_table_sql(table, columns)?;
                sqlx::query(&ddl)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| StoreError::Schema {
                        table: table.clone(),
                        message: e.to_string(),
                    })?;
            }
            TableAction::AlterTableAddColumns { table, columns } => {
                validate_table_name(table).map_err(|e| StoreError::Schema {
                    table: table.clone(),
                    message: e.to_string(),
                })?;
                for column in columns {
                    let ddl = format!(
                        "ALTER TABLE \"{table}\" ADD COLUMN IF NOT EXISTS {}",
                        column_clause(column)?
                    );
                    sqlx::query(&ddl)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| StoreError::Schema {
                            table: table.clone(),
                            message: e.to_string(),
                        })?;
                }
            }
            TableAction::NoChangeDetected { .. } => {}
        }
        Ok(())
    }

    async fn insert_event(
        tx: &mut Transaction<'_, Postgres>,
        event: &AuditEvent,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meta_audit_events
                (actor_type, actor_id, event_type, resource_type, resource_ref, payload, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(actor_type_str(event.actor_type))
        .bind(&event.actor_id)
        .bind(&event.event_type)
        .bind(&event.resource_type)
        .bind(&event.resource_ref)
        .bind(&event.payload)
        .bind(event.timestamp)
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Audit {
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[async_trait]
impl CatalogueStore for PostgresStore {
    async fn schema_snapshot(&self) -> StoreResult<SchemaSnapshot> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT table_name, column_name
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name LIKE 'journal\_%' ESCAPE '\'
            ORDER BY table_name, ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.into()))?;

        let mut snapshot = SchemaSnapshot::new();
        for (table, column) in rows {
            snapshot.entry(table).or_default().insert(column);
        }
        Ok(snapshot)
    }

    async fn current_rule_set_version(&self, scope: &str) -> StoreResult<i64> {
        let version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) FROM admin_rule_sets WHERE scope = $1",
        )
        .bind(scope)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.into()))?;
        Ok(version)
    }

    async fn apply_schema_update(&self, unit: SchemaUpdateUnit) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Other(e.into()))?;

        for action in &unit.actions {
            Self::apply_action(&mut tx, action).await?;
        }

        let catalogue = serde_json::to_value(&unit.rule_set.catalogue)
            .map_err(|e| StoreError::Other(e.into()))?;
        sqlx::query(
            r#"
            INSERT INTO admin_rule_sets
                (rule_set_id, scope, version, catalogue, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(unit.rule_set.rule_set_id)
        .bind(&unit.rule_set.scope)
        .bind(unit.rule_set.version)
        .bind(&catalogue)
        .bind(unit.rule_set.created_at)
        .bind(&unit.rule_set.created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::VersionConflict {
                scope: unit.rule_set.scope.clone(),
                version: unit.rule_set.version,
            },
            _ => StoreError::Other(e.into()),
        })?;

        for policy in &unit.reminder_policies {
            let escalation = policy
                .escalation
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| StoreError::Other(e.into()))?;
            sqlx::query(
                r#"
                INSERT INTO admin_reminder_policies
                    (scope, metric_slug, schedule, timezone, escalation, updated_at)
                VALUES ($1, $2, $3, $4, $5, NOW())
                ON CONFLICT (scope, metric_slug) DO UPDATE
                SET schedule = EXCLUDED.schedule,
                    timezone = EXCLUDED.timezone,
                    escalation = EXCLUDED.escalation,
                    updated_at = NOW()
                "#,
            )
            .bind(&policy.scope)
            .bind(&policy.metric_slug)
            .bind(&policy.schedule)
            .bind(&policy.timezone)
            .bind(&escalation)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Other(e.into()))?;
        }

        for event in &unit.events {
            Self::insert_event(&mut tx, event).await?;
        }

        tx.commit().await.map_err(|e| StoreError::Other(e.into()))?;
        Ok(())
    }

    async fn append_event(&self, event: &AuditEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meta_audit_events
                (actor_type, actor_id, event_type, resource_type, resource_ref, payload, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(actor_type_str(event.actor_type))
        .bind(&event.actor_id)
        .bind(&event.event_type)
        .bind(&event.resource_type)
        .bind(&event.resource_ref)
        .bind(&event.payload)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Audit {
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn insert_entry(&self, table: &str, row: &JournalRow) -> StoreResult<Uuid> {
        validate_table_name(table).map_err(|e| StoreError::Insert {
            table: table.to_string(),
            message: e.to_string(),
        })?;
        for column in row.keys() {
            validate_column_name(column).map_err(|e| StoreError::Insert {
                table: table.to_string(),
                message: e.to_string(),
            })?;
        }

        let columns: Vec<String> = row.keys().map(|c| format!("\"{c}\"")).collect();
        let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("${i}")).collect();
        let sql = format!(
            "INSERT INTO \"{table}\" ({}) VALUES ({}) RETURNING entry_id",
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut query = sqlx::query_scalar::<_, Uuid>(&sql);
        for value in row.values() {
            query = match value {
                ColumnValue::Text(s) => query.bind(s.clone()),
                ColumnValue::Number(n) => query.bind(*n),
                ColumnValue::Integer(i) => query.bind(*i),
                ColumnValue::Bool(b) => query.bind(*b),
                ColumnValue::Timestamp(ts) => query.bind(*ts),
            };
        }

        query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Insert {
                table: table.to_string(),
                message: e.to_string(),
            })
    }

    async fn events(&self) -> StoreResult<Vec<AuditEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT actor_type, actor_id, event_type, resource_type, resource_ref,
                   payload, occurred_at
            FROM meta_audit_events
            ORDER BY occurred_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.into()))?;

        rows.into_iter()
            .map(|row| {
                let actor_type = parse_actor_type(row.get::<String, _>("actor_type").as_str())?;
                Ok(AuditEvent {
                    actor_type,
                    actor_id: row.get("actor_id"),
                    event_type: row.get("event_type"),
                    resource_type: row.get("resource_type"),
                    resource_ref: row.get("resource_ref"),
                    payload: row.get("payload"),
                    timestamp: row.get::<DateTime<Utc>, _>("occurred_at"),
                })
            })
            .collect()
    }

    async fn rule_set_history(&self, scope: &str) -> StoreResult<Vec<AdminRuleSet>> {
        let rows = sqlx::query(
            r#"
            SELECT rule_set_id, scope, version, catalogue, created_at, created_by
            FROM admin_rule_sets
            WHERE scope = $1
            ORDER BY version
            "#,
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Other(e.into()))?;

        rows.into_iter()
            .map(|row| {
                let catalogue = serde_json::from_value(row.get("catalogue"))
                    .map_err(|e| StoreError::Other(e.into()))?;
                Ok(AdminRuleSet {
                    rule_set_id: row.get("rule_set_id"),
                    scope: row.get("scope"),
                    version: row.get("version"),
                    catalogue,
                    created_at: row.get("created_at"),
                    created_by: row.get("created_by"),
                })
            })
            .collect()
    }
}

fn actor_type_str(actor: ActorType) -> &'static str {
    match actor {
        ActorType::Tool => "tool",
        ActorType::Workflow => "workflow",
        ActorType::Agent => "agent",
    }
}

fn parse_actor_type(value: &str) -> StoreResult<ActorType> {
    match value {
        "tool" => Ok(ActorType::Tool),
        "workflow" => Ok(ActorType::Workflow),
        "agent" => Ok(ActorType::Agent),
        other => Err(StoreError::Other(anyhow::anyhow!(
            "unknown actor type '{other}' in audit trail"
        ))),
    }
}

fn create_table_sql(table: &str, columns: &[ColumnSpec]) -> StoreResult<String> {
    validate_table_name(table).map_err(|e| StoreError::Schema {
        table: table.to_string(),
        message: e.to_string(),
    })?;
    let clauses = columns
        .iter()
        .map(column_clause)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE \"{table}\" (\n    {}\n)",
        clauses.join(",\n    ")
    ))
}

fn column_clause(column: &ColumnSpec) -> StoreResult<String> {
    validate_column_name(&column.name).map_err(|e| StoreError::Schema {
        table: String::new(),
        message: e.to_string(),
    })?;

    let mut clause = format!("\"{}\" {}", column.name, column.physical_type);
    if column.primary_key {
        clause.push_str(" PRIMARY KEY");
    }
    if let Some(default_sql) = &column.default_sql {
        clause.push_str(&format!(" DEFAULT {default_sql}"));
    }
    if !column.nullable && !column.primary_key {
        clause.push_str(" NOT NULL");
    }
    if let Some(values) = &column.enum_values {
        let quoted: Vec<String> = values
            .iter()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect();
        clause.push_str(&format!(
            " CHECK (\"{}\" IN ({}))",
            column.name,
            quoted.join(", ")
        ));
    }
    Ok(clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::metadata_columns;

    #[test]
    fn test_create_table_sql_shape() {
        let mut columns = metadata_columns();
        columns.push(ColumnSpec {
            name: "source".to_string(),
            physical_type: "TEXT".to_string(),
            nullable: true,
            enum_values: Some(vec!["tap".to_string(), "it's".to_string()]),
            primary_key: false,
            default_sql: None,
        });

        let sql = create_table_sql("journal_water_intake", &columns).unwrap();
        assert!(sql.starts_with("CREATE TABLE \"journal_water_intake\""));
        assert!(sql.contains("\"entry_id\" UUID PRIMARY KEY DEFAULT gen_random_uuid()"));
        assert!(sql.contains("\"recorded_at\" TIMESTAMPTZ DEFAULT NOW() NOT NULL"));
        // Single quotes in enum values are doubled, never raw.
        assert!(sql.contains("'it''s'"));
    }

    #[test]
    fn test_invalid_identifier_never_reaches_sql() {
        let err = create_table_sql("journal_x; DROP TABLE users", &metadata_columns()).unwrap_err();
        assert!(matches!(err, StoreError::Schema { .. }));
    }
}
