//! Transactional Executor / Audit Recorder
//!
//! Applies a table-action plan as one atomic unit: schema actions in plan
//! order, the new rule-set version, reconciled reminder policies, and the
//! audit events describing all of it. On failure the whole unit is rolled
//! back by the store and a `ddl.failure` event is recorded best-effort
//! outside the aborted unit. Transactions are serialized per scope; the
//! lifecycle is `PENDING -> EXECUTING -> {COMMITTED | ROLLED_BACK}` with no
//! automatic retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit::{event_types, ActorType, AuditEvent};
use crate::catalogue::{AdminRuleSet, ParsedCatalogue};
use crate::config::{ConflictPolicy, CoreConfig};
use crate::error::{CatalogueError, CatalogueResult};
use crate::planner::{TableAction, TableActionPlan};
use crate::store::{CatalogueStore, ReminderPolicyRecord, SchemaUpdateUnit};

/// Actor id stamped on executor-emitted audit events.
pub const EXECUTOR_ACTOR: &str = "schema-executor";

/// Lifecycle of one schema-update transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    Pending,
    Executing,
    Committed,
    RolledBack,
}

/// Result of one committed executor run.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub rule_set_version: i64,
    pub applied_actions: Vec<TableAction>,
    pub audit_events: Vec<AuditEvent>,
    pub performance_warnings: Vec<String>,
    pub state: ExecutionState,
}

/// Executor over a [`CatalogueStore`]. Cheap to share behind an `Arc`.
pub struct SchemaExecutor<S> {
    store: Arc<S>,
    config: CoreConfig,
    scope_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: CatalogueStore> SchemaExecutor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, CoreConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: CoreConfig) -> Self {
        Self {
            store,
            config,
            scope_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Apply `plan` for `scope` and persist `draft` as the next rule-set
    /// version, atomically.
    pub async fn execute(
        &self,
        plan: &TableActionPlan,
        draft: &ParsedCatalogue,
        scope: &str,
    ) -> CatalogueResult<ExecutionOutcome> {
        let lock = self.scope_lock(scope);
        let _guard = match self.config.scope_conflict {
            ConflictPolicy::Block => lock.lock_owned().await,
            ConflictPolicy::FailFast => {
                lock.try_lock_owned()
                    .map_err(|_| CatalogueError::ScopeConflict {
                        scope: scope.to_string(),
                    })?
            }
        };

        debug!(scope, actions = plan.actions.len(), "PENDING -> EXECUTING");
        let started = Instant::now();

        let version = self
            .store
            .current_rule_set_version(scope)
            .await
            .map_err(|e| CatalogueError::DdlFailure {
                message: e.to_string(),
            })?
            + 1;

        let rule_set = AdminRuleSet::new(scope, version, draft.clone(), draft.admin_id.clone());
        let reminder_policies = reminder_records(draft, scope);
        let events = build_events(plan, draft, scope, version);
        let unit = SchemaUpdateUnit {
            rule_set,
            actions: plan.actions.clone(),
            reminder_policies,
            events: events.clone(),
        };

        if let Err(store_err) = self.store.apply_schema_update(unit).await {
            warn!(scope, error = %store_err, "EXECUTING -> ROLLED_BACK");
            self.record_failure(scope, version, &store_err.to_string())
                .await;
            return Err(CatalogueError::DdlFailure {
                message: store_err.to_string(),
            });
        }

        let performance_warnings = self.check_duration(scope, started.elapsed().as_secs());
        info!(scope, version, "EXECUTING -> COMMITTED");

        Ok(ExecutionOutcome {
            rule_set_version: version,
            applied_actions: plan.actions.clone(),
            audit_events: events,
            performance_warnings,
            state: ExecutionState::Committed,
        })
    }

    fn scope_lock(&self, scope: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.scope_locks.lock().expect("scope lock map poisoned");
        locks
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Best-effort failure record, written outside the aborted unit.
    async fn record_failure(&self, scope: &str, attempted_version: i64, message: &str) {
        let event = AuditEvent::new(
            ActorType::Workflow,
            EXECUTOR_ACTOR,
            event_types::DDL_FAILURE,
            "admin_rule_set",
            scope,
            json!({
                "error": message,
                "attemptedVersion": attempted_version,
            }),
        );
        if let Err(audit_err) = self.store.append_event(&event).await {
            warn!(scope, error = %audit_err, "could not record ddl failure event");
        }
    }

    fn check_duration(&self, scope: &str, elapsed_secs: u64) -> Vec<String> {
        let mut warnings = Vec::new();
        if elapsed_secs >= self.config.slow_schema_escalate_secs {
            let message = format!(
                "schema update for scope '{scope}' took {elapsed_secs}s, past the escalation threshold of {}s",
                self.config.slow_schema_escalate_secs
            );
            warn!(scope, elapsed_secs, "slow schema update escalation");
            warnings.push(message);
        } else if elapsed_secs >= self.config.slow_schema_warn_secs {
            let message = format!(
                "schema update for scope '{scope}' took {elapsed_secs}s, past the warning threshold of {}s",
                self.config.slow_schema_warn_secs
            );
            warn!(scope, elapsed_secs, "slow schema update");
            warnings.push(message);
        }
        warnings
    }
}

fn reminder_records(draft: &ParsedCatalogue, scope: &str) -> Vec<ReminderPolicyRecord> {
    draft
        .metrics
        .iter()
        .map(|metric| ReminderPolicyRecord {
            scope: scope.to_string(),
            metric_slug: metric.slug.clone(),
            schedule: metric.reminder_policy.schedule.clone(),
            timezone: metric.reminder_policy.timezone.clone(),
            escalation: metric.reminder_policy.escalation.clone(),
        })
        .collect()
}

fn build_events(
    plan: &TableActionPlan,
    draft: &ParsedCatalogue,
    scope: &str,
    version: i64,
) -> Vec<AuditEvent> {
    let mut events = vec![AuditEvent::new(
        ActorType::Workflow,
        EXECUTOR_ACTOR,
        event_types::SCHEMA_UPDATE,
        "admin_rule_set",
        scope,
        json!({
            "version": version,
            "metricCount": draft.metrics.len(),
            "confidence": draft.confidence,
            "parserWarnings": draft.warnings,
            "actions": plan.actions.iter().map(TableAction::kind).collect::<Vec<_>>(),
        }),
    )];

    for action in &plan.actions {
        let (event_type, payload) = match action {
            TableAction::CreateTable { columns, .. } => (
                event_types::TABLE_CREATED,
                json!({"columns": column_names(columns)}),
            ),
            TableAction::AlterTableAddColumns { columns, .. } => (
                event_types::TABLE_ALTERED,
                json!({"addedColumns": column_names(columns)}),
            ),
            TableAction::NoChangeDetected { .. } => {
                (event_types::NO_CHANGE_DETECTED, json!({}))
            }
        };
        events.push(AuditEvent::new(
            ActorType::Workflow,
            EXECUTOR_ACTOR,
            event_type,
            "table",
            action.table(),
            payload,
        ));
    }

    events
}

fn column_names(columns: &[crate::planner::ColumnSpec]) -> Vec<&str> {
    columns.iter().map(|c| c.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::RetentionPolicy;
    use crate::parser::CatalogueParser;
    use crate::planner::{SchemaSnapshot, TableChangePlanner};
    use crate::store::MemoryStore;

    fn draft(text: &str) -> ParsedCatalogue {
        CatalogueParser::new().parse(text, None, Some("admin-1"))
    }

    fn empty_draft() -> ParsedCatalogue {
        ParsedCatalogue {
            metrics: Vec::new(),
            retention: RetentionPolicy::default(),
            confidence: 0.0,
            warnings: Vec::new(),
            rule_set_id: None,
            admin_id: None,
        }
    }

    #[tokio::test]
    async fn test_commit_bumps_version_and_records_events() {
        let store = Arc::new(MemoryStore::new());
        let executor = SchemaExecutor::new(store.clone());
        let planner = TableChangePlanner::new();

        let draft = draft("Track water intake in ml");
        let outcome = planner.plan(&draft, &SchemaSnapshot::new());
        assert!(outcome.rejections.is_empty());

        let result = executor
            .execute(&outcome.plan, &draft, "tenant-a")
            .await
            .unwrap();
        assert_eq!(result.rule_set_version, 1);
        assert_eq!(result.state, ExecutionState::Committed);

        let events = store.events().await.unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["catalogue.schema_update", "ddl.table_created"]
        );

        // Reminder policies reconciled for the new catalogue.
        let policy = store.reminder_policy("tenant-a", "water-intake").unwrap();
        assert_eq!(policy.schedule, "0 8,20 * * *");
    }

    #[tokio::test]
    async fn test_versions_are_monotonic_per_scope() {
        let store = Arc::new(MemoryStore::new());
        let executor = SchemaExecutor::new(store.clone());
        let planner = TableChangePlanner::new();
        let draft = draft("Track mood");

        let first = planner.plan(&draft, &store.schema_snapshot().await.unwrap());
        let v1 = executor
            .execute(&first.plan, &draft, "tenant-a")
            .await
            .unwrap();
        let second = planner.plan(&draft, &store.schema_snapshot().await.unwrap());
        let v2 = executor
            .execute(&second.plan, &draft, "tenant-a")
            .await
            .unwrap();
        let other = executor
            .execute(&TableActionPlan::default(), &empty_draft(), "tenant-b")
            .await
            .unwrap();

        assert_eq!(v1.rule_set_version, 1);
        assert_eq!(v2.rule_set_version, 2);
        assert_eq!(other.rule_set_version, 1);
    }

    #[tokio::test]
    async fn test_rollback_records_failure_event() {
        let store = Arc::new(MemoryStore::new());
        let executor = SchemaExecutor::new(store.clone());
        let planner = TableChangePlanner::new();
        let draft = draft("Track sleep");
        let outcome = planner.plan(&draft, &SchemaSnapshot::new());

        store.fail_next_schema_update();
        let err = executor
            .execute(&outcome.plan, &draft, "tenant-a")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DDL_FAILURE");

        // Nothing committed: no tables, no version, only the best-effort
        // failure record.
        assert!(store.schema_snapshot().await.unwrap().is_empty());
        assert_eq!(store.current_rule_set_version("tenant-a").await.unwrap(), 0);
        let events = store.events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "ddl.failure");
    }

    #[test]
    fn test_duration_thresholds() {
        let executor = SchemaExecutor::new(Arc::new(MemoryStore::new()));

        assert!(executor.check_duration("tenant-a", 1).is_empty());

        let warnings = executor.check_duration("tenant-a", 45);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("warning threshold"));

        let warnings = executor.check_duration("tenant-a", 500);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("escalation threshold"));
    }

    #[tokio::test]
    async fn test_fail_fast_conflict() {
        let store = Arc::new(MemoryStore::new());
        let config = CoreConfig {
            scope_conflict: ConflictPolicy::FailFast,
            ..CoreConfig::default()
        };
        let executor = SchemaExecutor::with_config(store, config);

        let lock = executor.scope_lock("tenant-a");
        let _held = lock.lock_owned().await;

        let err = executor
            .execute(&TableActionPlan::default(), &empty_draft(), "tenant-a")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogueError::ScopeConflict { .. }));

        // A different scope is unaffected.
        executor
            .execute(&TableActionPlan::default(), &empty_draft(), "tenant-b")
            .await
            .unwrap();
    }
}
