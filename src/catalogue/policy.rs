//! Reminder and retention policies.

use serde::{Deserialize, Serialize};

use crate::error::{CatalogueError, CatalogueResult};

/// Default schedule when the admin text names none: 08:00 and 20:00.
pub const TWICE_DAILY_SCHEDULE: &str = "0 8,20 * * *";

/// Escalation clause attached to a reminder policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub notify_caregiver_after_minutes: u32,
    pub notify_admin_after_minutes: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            notify_caregiver_after_minutes: 30,
            notify_admin_after_minutes: 120,
        }
    }
}

/// When and where reminders for a metric fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPolicy {
    /// Cron-like schedule expression.
    pub schedule: String,
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationPolicy>,
}

impl ReminderPolicy {
    pub fn new(schedule: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            timezone: timezone.into(),
            escalation: None,
        }
    }

    pub fn with_escalation(mut self, escalation: EscalationPolicy) -> Self {
        self.escalation = Some(escalation);
        self
    }
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self::new(TWICE_DAILY_SCHEDULE, "UTC")
    }
}

/// How long journal entries and documents are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub journal_retention_days: u32,
    pub document_retention_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            journal_retention_days: 365,
            document_retention_days: 180,
        }
    }
}

impl RetentionPolicy {
    pub fn validate(&self) -> CatalogueResult<()> {
        if self.journal_retention_days == 0 || self.document_retention_days == 0 {
            return Err(CatalogueError::validation(
                "retention policy",
                "retention days must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_defaults() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.journal_retention_days, 365);
        assert_eq!(policy.document_retention_days, 180);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_zero_retention_rejected() {
        let policy = RetentionPolicy {
            journal_retention_days: 0,
            document_retention_days: 180,
        };
        assert_eq!(policy.validate().unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_default_reminder_is_twice_daily() {
        let policy = ReminderPolicy::default();
        assert_eq!(policy.schedule, TWICE_DAILY_SCHEDULE);
        assert_eq!(policy.timezone, "UTC");
        assert!(policy.escalation.is_none());
    }
}
