//! Append-only audit events.
//!
//! Every structural change and every data write is reconstructable from
//! these records. The serialized shape is a compliance contract: camelCase
//! keys, lowercase actor types, ISO-8601 timestamps. Events are never
//! updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who performed the audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Tool,
    Workflow,
    Agent,
}

/// Stable event type strings.
pub mod event_types {
    /// Summary of one whole schema-update run.
    pub const SCHEMA_UPDATE: &str = "catalogue.schema_update";
    pub const TABLE_CREATED: &str = "ddl.table_created";
    pub const TABLE_ALTERED: &str = "ddl.table_altered";
    pub const NO_CHANGE_DETECTED: &str = "ddl.no_change_detected";
    /// Best-effort record written outside an aborted transaction.
    pub const DDL_FAILURE: &str = "ddl.failure";
    pub const ENTRY_RECORDED: &str = "journal.entry_recorded";
    pub const UNAUTHORIZED_ACCESS: &str = "security.unauthorized_access";
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub actor_type: ActorType,
    pub actor_id: String,
    pub event_type: String,
    pub resource_type: String,
    pub resource_ref: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor_type: ActorType,
        actor_id: impl Into<String>,
        event_type: impl Into<String>,
        resource_type: impl Into<String>,
        resource_ref: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            event_type: event_type.into(),
            resource_type: resource_type.into(),
            resource_ref: resource_ref.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let event = AuditEvent::new(
            ActorType::Workflow,
            "schema-executor",
            event_types::SCHEMA_UPDATE,
            "admin_rule_set",
            "tenant-a",
            json!({"version": 1}),
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["actorType"], "workflow");
        assert_eq!(value["actorId"], "schema-executor");
        assert_eq!(value["eventType"], "catalogue.schema_update");
        assert_eq!(value["resourceType"], "admin_rule_set");
        assert_eq!(value["resourceRef"], "tenant-a");
        assert_eq!(value["payload"]["version"], 1);
        // chrono serializes DateTime<Utc> as an ISO-8601 / RFC 3339 string.
        let ts = value["timestamp"].as_str().unwrap();
        assert!(ts.contains('T'));
    }

    #[test]
    fn test_actor_type_strings() {
        for (actor, expected) in [
            (ActorType::Tool, "\"tool\""),
            (ActorType::Workflow, "\"workflow\""),
            (ActorType::Agent, "\"agent\""),
        ] {
            assert_eq!(serde_json::to_string(&actor).unwrap(), expected);
        }
    }
}
