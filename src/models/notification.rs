use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EscalationReason, NotificationPriority, NotificationStatus};

/// A persisted escalation to human staff.
///
/// Created by the notification fanout with status Pending; the later
/// lifecycle (assigned → responded → resolved, or dismissed) is mutated by
/// staff tooling outside this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationNotification {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub reason: EscalationReason,
    pub priority: NotificationPriority,
    pub status: NotificationStatus,
    /// Staff-facing summary of why the escalation was raised.
    pub message: String,
    pub assigned_to: Option<String>,
    pub response: Option<String>,
    pub created_at: NaiveDateTime,
    pub responded_at: Option<NaiveDateTime>,
}
