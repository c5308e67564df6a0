//! Runtime configuration for the catalogue core.
//!
//! Mirrors the deployment knobs the core actually honours: slow-schema
//! thresholds, the per-scope conflict policy, and the default reminder
//! timezone. Everything else (timeouts, cancellation) is an external policy.

use std::env;

/// How a second schema update for an already-busy scope is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Wait for the in-flight transaction to finish.
    Block,
    /// Fail immediately with a conflict error.
    FailFast,
}

/// Configuration for the executor and parser defaults.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Emit a performance warning when a schema update exceeds this.
    pub slow_schema_warn_secs: u64,
    /// Emit an escalation warning when a schema update exceeds this.
    pub slow_schema_escalate_secs: u64,
    /// Per-scope serialization policy for concurrent schema updates.
    pub scope_conflict: ConflictPolicy,
    /// Timezone assigned to reminder policies when the text names none.
    pub default_timezone: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            slow_schema_warn_secs: 30,
            slow_schema_escalate_secs: 120,
            scope_conflict: ConflictPolicy::Block,
            default_timezone: "UTC".to_string(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `CATALOGUE_SLOW_SCHEMA_WARN_SECS`,
    /// `CATALOGUE_SLOW_SCHEMA_ESCALATE_SECS`, `CATALOGUE_SCOPE_CONFLICT`
    /// (`block` | `fail-fast`), `CATALOGUE_DEFAULT_TIMEZONE`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let slow_schema_warn_secs = env_u64(
            "CATALOGUE_SLOW_SCHEMA_WARN_SECS",
            defaults.slow_schema_warn_secs,
        );
        let slow_schema_escalate_secs = env_u64(
            "CATALOGUE_SLOW_SCHEMA_ESCALATE_SECS",
            defaults.slow_schema_escalate_secs,
        );
        let scope_conflict = match env::var("CATALOGUE_SCOPE_CONFLICT").as_deref() {
            Ok("fail-fast") | Ok("fail_fast") => ConflictPolicy::FailFast,
            Ok("block") => ConflictPolicy::Block,
            _ => defaults.scope_conflict,
        };
        let default_timezone =
            env::var("CATALOGUE_DEFAULT_TIMEZONE").unwrap_or(defaults.default_timezone);

        Self {
            slow_schema_warn_secs,
            slow_schema_escalate_secs,
            scope_conflict,
            default_timezone,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
