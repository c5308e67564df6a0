//! Store seam between the core and its persistence backend.
//!
//! The executor and gatekeeper never speak SQL themselves; they hand the
//! store whole units of work. Two implementations exist: an in-memory store
//! (always available, the test backbone) and a PostgreSQL store behind the
//! `database` feature.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::catalogue::{AdminRuleSet, EscalationPolicy};
use crate::error::StoreResult;
use crate::planner::{SchemaSnapshot, TableAction};

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use postgres::PostgresStore;

/// Reminder policy record reconciled per (scope, metric slug). Rule-set
/// versions are the history; these rows are always the current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPolicyRecord {
    pub scope: String,
    pub metric_slug: String,
    pub schedule: String,
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationPolicy>,
}

/// One atomic schema-update unit. Either everything in it becomes visible
/// or nothing does.
#[derive(Debug, Clone)]
pub struct SchemaUpdateUnit {
    pub rule_set: AdminRuleSet,
    pub actions: Vec<TableAction>,
    pub reminder_policies: Vec<ReminderPolicyRecord>,
    pub events: Vec<AuditEvent>,
}

/// A typed value bound into a journal column. Produced by the field
/// validator, so the physical type is already known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ColumnValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl ColumnValue {
    pub fn as_json(&self) -> serde_json::Value {
        match self {
            ColumnValue::Text(s) => serde_json::Value::String(s.clone()),
            ColumnValue::Number(n) => serde_json::json!(n),
            ColumnValue::Integer(i) => serde_json::json!(i),
            ColumnValue::Bool(b) => serde_json::Value::Bool(*b),
            ColumnValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
        }
    }
}

/// Validated row content: physical column name to typed value. Optional
/// fields that were not supplied are absent, never null.
pub type JournalRow = BTreeMap<String, ColumnValue>;

/// Persistence contract used by the executor and the gatekeeper.
#[async_trait]
pub trait CatalogueStore: Send + Sync {
    /// Current physical schema of the journal tables.
    async fn schema_snapshot(&self) -> StoreResult<SchemaSnapshot>;

    /// Highest persisted rule-set version for the scope; 0 when none.
    async fn current_rule_set_version(&self, scope: &str) -> StoreResult<i64>;

    /// Apply one schema-update unit atomically. A failure leaves no
    /// partial schema state, rule-set version, or audit trail behind.
    async fn apply_schema_update(&self, unit: SchemaUpdateUnit) -> StoreResult<()>;

    /// Append one audit event outside any transaction. Used for
    /// best-effort failure records and security events.
    async fn append_event(&self, event: &AuditEvent) -> StoreResult<()>;

    /// Parameterized insert into a journal table. Identifiers must already
    /// have passed planner/generator validation; values are bound, never
    /// concatenated.
    async fn insert_entry(&self, table: &str, row: &JournalRow) -> StoreResult<Uuid>;

    /// Full audit trail, oldest first.
    async fn events(&self) -> StoreResult<Vec<AuditEvent>>;

    /// All persisted rule-set versions for a scope, ascending.
    async fn rule_set_history(&self, scope: &str) -> StoreResult<Vec<AdminRuleSet>>;
}
