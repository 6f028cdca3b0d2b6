use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ConfirmationStatus;

/// A scheduled medication or care-task reminder for one patient.
///
/// `confirmation_status` is None until the reminder has actually been
/// delivered; a delivered reminder starts at Pending and moves to
/// Confirmed/Missed on the patient's reply, or Failed if delivery broke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// What is being reminded, e.g. a medication name.
    pub title: String,
    /// Recurrence descriptor as entered by staff ("daily", "mon/wed/fri", ...).
    pub recurrence: String,
    /// When this occurrence is (or was) due.
    pub scheduled_for: NaiveDateTime,
    pub ends_on: Option<NaiveDate>,
    pub is_active: bool,
    pub confirmation_status: Option<ConfirmationStatus>,
    pub confirmed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

impl ReminderRecord {
    /// Delivered means the patient was actually sent this occurrence.
    pub fn is_delivered(&self) -> bool {
        self.confirmation_status.is_some()
    }

    pub fn awaits_confirmation(&self) -> bool {
        self.is_active && self.confirmation_status == Some(ConfirmationStatus::Pending)
    }
}

/// A staff-entered record that a reminder was completed, independent of the
/// patient's own reply. A reminder counts as completed if EITHER its own
/// status is Confirmed OR one of these exists for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualConfirmation {
    pub id: Uuid,
    pub reminder_id: Uuid,
    pub confirmed_by: String,
    pub note: Option<String>,
    pub recorded_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn reminder(status: Option<ConfirmationStatus>) -> ReminderRecord {
        ReminderRecord {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            title: "Candesartan 8mg".into(),
            recurrence: "daily".into(),
            scheduled_for: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            ends_on: None,
            is_active: true,
            confirmation_status: status,
            confirmed_at: None,
            created_at: NaiveDate::from_ymd_opt(2026, 2, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            deleted_at: None,
        }
    }

    #[test]
    fn undelivered_reminder_does_not_await_confirmation() {
        assert!(!reminder(None).awaits_confirmation());
        assert!(!reminder(None).is_delivered());
    }

    #[test]
    fn pending_reminder_awaits_confirmation() {
        assert!(reminder(Some(ConfirmationStatus::Pending)).awaits_confirmation());
    }

    #[test]
    fn confirmed_reminder_no_longer_awaits() {
        assert!(!reminder(Some(ConfirmationStatus::Confirmed)).awaits_confirmation());
    }

    #[test]
    fn inactive_reminder_never_awaits() {
        let mut r = reminder(Some(ConfirmationStatus::Pending));
        r.is_active = false;
        assert!(!r.awaits_confirmation());
    }
}
