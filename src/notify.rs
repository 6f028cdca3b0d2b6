//! Escalation notification fanout.
//!
//! One escalation produces one persisted notification row plus a
//! best-effort broadcast over every enabled channel. The row is the source
//! of truth: once written with status Pending it stays written no matter
//! how many channels fail to deliver.

use std::sync::Arc;

use chrono::Local;
use futures_util::future::join_all;
use thiserror::Error;
use uuid::Uuid;

use crate::config::HIGH_PRIORITY_CONFIDENCE_PERCENT;
use crate::models::{
    EscalationNotification, EscalationReason, NotificationPriority, NotificationStatus,
};
use crate::store::{NotificationStore, PatientStore, StoreError};
use crate::transport::MessagingTransport;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Cannot escalate for unknown patient {0}")]
    PatientNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a component asks the fanout to escalate.
#[derive(Debug, Clone)]
pub struct EscalationRequest {
    pub patient_id: Uuid,
    pub reason: EscalationReason,
    /// Staff-facing summary; never the raw patient message.
    pub summary: String,
    /// Classification confidence as a percentage, when the reason is
    /// low confidence.
    pub confidence_percent: Option<f32>,
}

/// Derive notification priority from the escalation reason.
pub fn derive_priority(reason: EscalationReason, confidence_percent: Option<f32>) -> NotificationPriority {
    match reason {
        EscalationReason::EmergencyDetection => NotificationPriority::Emergency,
        EscalationReason::LowConfidence => {
            let confidence = confidence_percent.unwrap_or(0.0);
            if confidence < HIGH_PRIORITY_CONFIDENCE_PERCENT {
                NotificationPriority::High
            } else {
                NotificationPriority::Medium
            }
        }
        EscalationReason::ComplexInquiry => NotificationPriority::Medium,
        EscalationReason::Other => NotificationPriority::Low,
    }
}

/// Staff recipients for the messaging channel. Email stays a placeholder
/// until the program has an address book.
#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    pub messaging_recipients: Vec<String>,
    pub email_recipients: Vec<String>,
}

pub struct Notifier {
    patients: Arc<dyn PatientStore>,
    notifications: Arc<dyn NotificationStore>,
    transport: Arc<dyn MessagingTransport>,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(
        patients: Arc<dyn PatientStore>,
        notifications: Arc<dyn NotificationStore>,
        transport: Arc<dyn MessagingTransport>,
        config: NotifierConfig,
    ) -> Self {
        Self {
            patients,
            notifications,
            transport,
            config,
        }
    }

    /// Create, persist, and broadcast one escalation.
    ///
    /// Channel delivery is concurrent and failure-isolated: a dead gateway
    /// or a bad recipient is logged and skipped, and never unwinds the
    /// persisted row.
    pub async fn create(
        &self,
        request: EscalationRequest,
    ) -> Result<EscalationNotification, NotifyError> {
        let patient = self
            .patients
            .patient(request.patient_id)
            .await?
            .ok_or(NotifyError::PatientNotFound(request.patient_id))?;

        let priority = derive_priority(request.reason, request.confidence_percent);
        let notification = EscalationNotification {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            reason: request.reason,
            priority,
            status: NotificationStatus::Pending,
            message: request.summary,
            assigned_to: None,
            response: None,
            created_at: Local::now().naive_local(),
            responded_at: None,
        };

        // The dashboard channel is the row itself.
        self.notifications.insert_notification(&notification).await?;
        tracing::info!(
            notification_id = %notification.id,
            reason = notification.reason.as_str(),
            priority = notification.priority.as_str(),
            "Escalation persisted"
        );

        self.broadcast(&patient.name, &notification).await;
        Ok(notification)
    }

    async fn broadcast(&self, patient_name: &str, notification: &EscalationNotification) {
        let alert = format!(
            "[{}] Eskalasi pasien {}: {} ({})",
            notification.priority.as_str().to_uppercase(),
            patient_name,
            notification.message,
            notification.reason.as_str(),
        );

        let sends = self
            .config
            .messaging_recipients
            .iter()
            .map(|recipient| {
                let alert = alert.clone();
                async move {
                    (
                        recipient.clone(),
                        self.transport.send(recipient, &alert).await,
                    )
                }
            });
        for (recipient, result) in join_all(sends).await {
            if let Err(e) = result {
                tracing::warn!(
                    recipient,
                    error = %e,
                    "Escalation: messaging channel delivery failed"
                );
            }
        }

        // Email channel not wired up yet; log so the gap is visible.
        for recipient in &self.config.email_recipients {
            tracing::info!(recipient, "Escalation: email channel is a placeholder");
        }
    }

    /// Mean time from creation to staff response over responded rows.
    pub async fn average_response_time(&self) -> Result<Option<chrono::Duration>, NotifyError> {
        let responded = self.notifications.responded_notifications().await?;
        let durations: Vec<chrono::Duration> = responded
            .iter()
            .filter_map(|n| n.responded_at.map(|at| at - n.created_at))
            .collect();
        if durations.is_empty() {
            return Ok(None);
        }
        let total = durations
            .iter()
            .fold(chrono::Duration::zero(), |acc, d| acc + *d);
        Ok(Some(total / durations.len() as i32))
    }
}
