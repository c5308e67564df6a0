//! Execution Gatekeeper - the write whitelist.
//!
//! The sole path by which validated data reaches a journal table. The
//! whitelist grows monotonically as tables pass planning/registration and
//! never shrinks during normal operation; `clear` exists only for test
//! isolation. Identifiers used in writes are always names that passed
//! planner/generator validation, so this is the last line of defense
//! against structural injection even when an upstream validator is
//! bypassed or misconfigured.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audit::{event_types, ActorType, AuditEvent};
use crate::error::{CatalogueError, CatalogueResult};
use crate::planner::validate_table_name;
use crate::store::{CatalogueStore, JournalRow};

/// Whitelist plus the parameterized write path over a store.
pub struct ExecutionGatekeeper<S> {
    store: Arc<S>,
    allowed: RwLock<BTreeSet<String>>,
}

impl<S: CatalogueStore> ExecutionGatekeeper<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            allowed: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Register a table for dynamic writes. Idempotent and monotonic.
    pub fn add_allowed_table(&self, table: &str) -> CatalogueResult<()> {
        validate_table_name(table)?;
        let mut allowed = self.allowed.write().expect("whitelist poisoned");
        if allowed.insert(table.to_string()) {
            debug!(table, "table registered for dynamic writes");
        }
        Ok(())
    }

    pub fn is_allowed(&self, table: &str) -> bool {
        self.allowed
            .read()
            .expect("whitelist poisoned")
            .contains(table)
    }

    pub fn allowed_tables(&self) -> BTreeSet<String> {
        self.allowed.read().expect("whitelist poisoned").clone()
    }

    /// Drop every registration. Test isolation only.
    pub fn clear(&self) {
        self.allowed.write().expect("whitelist poisoned").clear();
    }

    /// Persist one validated row. Rejects unregistered tables with a
    /// security event and no store access.
    pub async fn write(
        &self,
        table: &str,
        actor_id: &str,
        row: &JournalRow,
    ) -> CatalogueResult<Uuid> {
        if !self.is_allowed(table) {
            warn!(table, actor_id, "write to unregistered table refused");
            let event = AuditEvent::new(
                ActorType::Tool,
                actor_id,
                event_types::UNAUTHORIZED_ACCESS,
                "table",
                table,
                json!({"reason": "table not in write whitelist"}),
            );
            if let Err(audit_err) = self.store.append_event(&event).await {
                warn!(table, error = %audit_err, "could not record security event");
            }
            return Err(CatalogueError::RlsViolation {
                table: table.to_string(),
                reason: "table is not registered for dynamic writes".to_string(),
            });
        }

        let entry_id =
            self.store
                .insert_entry(table, row)
                .await
                .map_err(|e| CatalogueError::Unknown {
                    message: e.to_string(),
                })?;

        let event = AuditEvent::new(
            ActorType::Tool,
            actor_id,
            event_types::ENTRY_RECORDED,
            "table",
            table,
            json!({
                "entryId": entry_id,
                "row": row
                    .iter()
                    .map(|(column, value)| (column.clone(), value.as_json()))
                    .collect::<serde_json::Map<_, _>>(),
            }),
        );
        if let Err(audit_err) = self.store.append_event(&event).await {
            warn!(table, error = %audit_err, "could not record entry event");
        }

        Ok(entry_id)
    }
}
