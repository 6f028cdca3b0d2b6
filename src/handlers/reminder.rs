//! Reminder confirmation handler.
//!
//! Requires a verified patient with at least one delivered reminder still
//! awaiting a reply. The most recently due awaiting reminder is the one a
//! bare "sudah" refers to.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;

use super::{HandlerResponse, InteractionHandler, InteractionRequest};
use crate::classify::{fallback, ClassificationService, ConfirmationReply};
use crate::context::ContextAggregator;
use crate::models::{
    ConfirmationStatus, EscalationReason, InteractionType, PatientIdentity, ReminderRecord,
};
use crate::notify::{EscalationRequest, Notifier};
use crate::store::ReminderStore;

const REPLY_CONFIRMED: &str = "Terima kasih, sudah kami catat. Semoga sehat selalu!";
const REPLY_MISSED: &str = "Baik, sudah kami catat. Jangan lupa minum obat berikutnya \
     sesuai jadwal ya.";
const REPLY_HELP: &str = "Kami mengerti. Petugas kesehatan kami akan segera menghubungi \
     Anda untuk membantu.";
const REPLY_CLARIFY: &str = "Maaf, kami kurang paham. Apakah obatnya sudah diminum? \
     Balas \"sudah\" atau \"belum\".";

pub struct ReminderHandler {
    reminders: Arc<dyn ReminderStore>,
    aggregator: Arc<ContextAggregator>,
    classifier: Arc<dyn ClassificationService>,
    notifier: Arc<Notifier>,
}

impl ReminderHandler {
    pub fn new(
        reminders: Arc<dyn ReminderStore>,
        aggregator: Arc<ContextAggregator>,
        classifier: Arc<dyn ClassificationService>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            reminders,
            aggregator,
            classifier,
            notifier,
        }
    }

    async fn persist_confirmation(
        &self,
        request: &InteractionRequest,
        reminder: &ReminderRecord,
        status: ConfirmationStatus,
    ) -> Result<(), crate::store::StoreError> {
        self.reminders
            .update_confirmation(reminder.id, status, Local::now().naive_local())
            .await?;
        // Invalidate after the write lands: a rebuild racing this call must
        // not re-cache the pre-mutation snapshot for a full TTL.
        self.aggregator.invalidate(&request.patient).await;
        Ok(())
    }
}

/// Most recently due first, so a bare reply lands on the newest reminder.
fn pick_target(mut awaiting: Vec<ReminderRecord>) -> ReminderRecord {
    awaiting.sort_by_key(|r| std::cmp::Reverse(r.scheduled_for));
    awaiting.remove(0)
}

#[async_trait]
impl InteractionHandler for ReminderHandler {
    fn priority(&self) -> u8 {
        20
    }

    fn can_handle(&self, interaction: InteractionType, patient: &PatientIdentity) -> bool {
        interaction == InteractionType::ReminderConfirmation && patient.is_verified()
    }

    async fn handle(&self, request: &InteractionRequest) -> HandlerResponse {
        let awaiting = match self.reminders.awaiting_confirmation(request.patient.id).await {
            Ok(awaiting) => awaiting,
            Err(e) => {
                tracing::error!(error = %e, "Reminder confirmation: store read failed");
                return HandlerResponse::failure("Reminder lookup failed");
            }
        };
        if awaiting.is_empty() {
            return HandlerResponse {
                processed: false,
                action: None,
                reply: None,
                escalated: false,
                error: Some("No reminder awaiting confirmation".to_string()),
            };
        }

        let classification = match self
            .classifier
            .classify_confirmation(&request.message, &request.context)
            .await
        {
            Ok(classification) => classification,
            Err(e) => {
                tracing::warn!(error = %e, "Reminder confirmation: classifier failed, keyword fallback");
                fallback::classify_confirmation(&request.message)
            }
        };

        let target = pick_target(awaiting);
        match classification.reply {
            ConfirmationReply::Confirmed => {
                if let Err(e) = self
                    .persist_confirmation(request, &target, ConfirmationStatus::Confirmed)
                    .await
                {
                    tracing::error!(error = %e, "Reminder confirmation: update failed");
                    return HandlerResponse::failure("Reminder update failed");
                }
                tracing::info!(reminder_id = %target.id, "Reminder confirmed");
                HandlerResponse {
                    processed: true,
                    action: Some("reminder_confirmed".to_string()),
                    reply: Some(REPLY_CONFIRMED.to_string()),
                    escalated: false,
                    error: None,
                }
            }
            ConfirmationReply::Missed => {
                if let Err(e) = self
                    .persist_confirmation(request, &target, ConfirmationStatus::Missed)
                    .await
                {
                    tracing::error!(error = %e, "Reminder confirmation: update failed");
                    return HandlerResponse::failure("Reminder update failed");
                }
                tracing::info!(reminder_id = %target.id, "Reminder marked missed");
                HandlerResponse {
                    processed: true,
                    action: Some("reminder_missed".to_string()),
                    reply: Some(REPLY_MISSED.to_string()),
                    escalated: false,
                    error: None,
                }
            }
            ConfirmationReply::HelpNeeded => {
                let escalated = self
                    .notifier
                    .create(EscalationRequest {
                        patient_id: request.patient.id,
                        reason: EscalationReason::ComplexInquiry,
                        summary: format!(
                            "Pasien meminta bantuan terkait pengingat \"{}\"",
                            target.title
                        ),
                        confidence_percent: None,
                    })
                    .await;
                if let Err(e) = &escalated {
                    tracing::error!(error = %e, "Reminder confirmation: escalation failed");
                }
                HandlerResponse {
                    processed: true,
                    action: Some("reminder_help_escalated".to_string()),
                    reply: Some(REPLY_HELP.to_string()),
                    escalated: escalated.is_ok(),
                    error: escalated.err().map(|e| e.to_string()),
                }
            }
            ConfirmationReply::Unrecognized => HandlerResponse {
                processed: true,
                action: Some("reminder_clarification".to_string()),
                reply: Some(REPLY_CLARIFY.to_string()),
                escalated: false,
                error: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::cache::InMemoryContextCache;
    use crate::classify::{
        ClassifyError, ConfirmationClassification, InquiryClassification,
        VerificationClassification,
    };
    use crate::context::PatientContext;
    use crate::models::VerificationStatus;
    use crate::notify::NotifierConfig;
    use crate::store::SqliteStore;
    use crate::transport::LoggingTransport;

    struct FallbackOnly;

    #[async_trait]
    impl ClassificationService for FallbackOnly {
        async fn classify_verification(
            &self,
            _message: &str,
            _context: &PatientContext,
        ) -> Result<VerificationClassification, ClassifyError> {
            Err(ClassifyError::Connection("mock".into()))
        }
        async fn classify_confirmation(
            &self,
            _message: &str,
            _context: &PatientContext,
        ) -> Result<ConfirmationClassification, ClassifyError> {
            Err(ClassifyError::Connection("mock".into()))
        }
        async fn classify_inquiry(
            &self,
            _message: &str,
            _context: &PatientContext,
        ) -> Result<InquiryClassification, ClassifyError> {
            Err(ClassifyError::Connection("mock".into()))
        }
    }

    fn verified_patient(store: &SqliteStore) -> PatientIdentity {
        let patient = PatientIdentity {
            id: Uuid::new_v4(),
            name: "Pak Dedi".into(),
            phone: "+628123456789".into(),
            verification_status: VerificationStatus::Verified,
            verification_responded_at: None,
            is_active: true,
            created_at: Local::now().naive_local(),
            deleted_at: None,
        };
        store.insert_patient(&patient).unwrap();
        patient
    }

    fn awaiting_reminder(store: &SqliteStore, patient_id: Uuid, hours_ago: i64) -> ReminderRecord {
        let reminder = ReminderRecord {
            id: Uuid::new_v4(),
            patient_id,
            title: "Amlodipine 5mg".into(),
            recurrence: "daily".into(),
            scheduled_for: Local::now().naive_local() - chrono::Duration::hours(hours_ago),
            ends_on: None,
            is_active: true,
            confirmation_status: Some(ConfirmationStatus::Pending),
            confirmed_at: None,
            created_at: Local::now().naive_local(),
            deleted_at: None,
        };
        store.insert_reminder(&reminder).unwrap();
        reminder
    }

    fn handler(store: &std::sync::Arc<SqliteStore>) -> ReminderHandler {
        let aggregator = Arc::new(ContextAggregator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(InMemoryContextCache::new()),
        ));
        let notifier = Arc::new(Notifier::new(
            store.clone(),
            store.clone(),
            Arc::new(LoggingTransport),
            NotifierConfig::default(),
        ));
        ReminderHandler::new(store.clone(), aggregator, Arc::new(FallbackOnly), notifier)
    }

    fn request(patient: &PatientIdentity, message: &str) -> InteractionRequest {
        InteractionRequest {
            message: message.into(),
            patient: patient.clone(),
            context: crate::context::test_support::empty_context(),
        }
    }

    async fn stored_status(store: &SqliteStore, patient_id: Uuid, reminder_id: Uuid) -> Option<ConfirmationStatus> {
        store
            .active_reminders(patient_id)
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.id == reminder_id)
            .and_then(|r| r.confirmation_status)
    }

    #[tokio::test]
    async fn sudah_confirms_the_reminder() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = verified_patient(&store);
        let reminder = awaiting_reminder(&store, patient.id, 1);

        let response = handler(&store).handle(&request(&patient, "sudah bu")).await;
        assert!(response.processed);
        assert_eq!(response.action.as_deref(), Some("reminder_confirmed"));
        assert_eq!(
            stored_status(&store, patient.id, reminder.id).await,
            Some(ConfirmationStatus::Confirmed)
        );
    }

    #[tokio::test]
    async fn belum_marks_missed() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = verified_patient(&store);
        let reminder = awaiting_reminder(&store, patient.id, 1);

        let response = handler(&store).handle(&request(&patient, "belum, lupa")).await;
        assert!(response.processed);
        assert_eq!(
            stored_status(&store, patient.id, reminder.id).await,
            Some(ConfirmationStatus::Missed)
        );
    }

    #[tokio::test]
    async fn newest_awaiting_reminder_is_the_target() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = verified_patient(&store);
        let older = awaiting_reminder(&store, patient.id, 10);
        let newer = awaiting_reminder(&store, patient.id, 1);

        handler(&store).handle(&request(&patient, "sudah")).await;
        assert_eq!(
            stored_status(&store, patient.id, newer.id).await,
            Some(ConfirmationStatus::Confirmed)
        );
        assert_eq!(
            stored_status(&store, patient.id, older.id).await,
            Some(ConfirmationStatus::Pending)
        );
    }

    #[tokio::test]
    async fn no_awaiting_reminder_is_unprocessed() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = verified_patient(&store);

        let response = handler(&store).handle(&request(&patient, "sudah")).await;
        assert!(!response.processed);
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn help_request_escalates_without_mutating() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = verified_patient(&store);
        let reminder = awaiting_reminder(&store, patient.id, 1);

        let response = handler(&store)
            .handle(&request(&patient, "tolong, saya bingung cara minumnya"))
            .await;
        assert!(response.processed);
        assert!(response.escalated);
        assert_eq!(
            stored_status(&store, patient.id, reminder.id).await,
            Some(ConfirmationStatus::Pending)
        );
    }

    #[tokio::test]
    async fn unrecognized_reply_asks_for_clarification() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = verified_patient(&store);
        let reminder = awaiting_reminder(&store, patient.id, 1);

        let response = handler(&store).handle(&request(&patient, "cuaca cerah")).await;
        assert!(response.processed);
        assert_eq!(response.action.as_deref(), Some("reminder_clarification"));
        assert_eq!(
            stored_status(&store, patient.id, reminder.id).await,
            Some(ConfirmationStatus::Pending)
        );
    }

    #[tokio::test]
    async fn confirmation_write_invalidates_cached_context() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = verified_patient(&store);
        let reminder = awaiting_reminder(&store, patient.id, 1);
        let aggregator = Arc::new(ContextAggregator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(InMemoryContextCache::new()),
        ));
        let notifier = Arc::new(Notifier::new(
            store.clone(),
            store.clone(),
            Arc::new(LoggingTransport),
            NotifierConfig::default(),
        ));
        let handler = ReminderHandler::new(
            store.clone(),
            aggregator.clone(),
            Arc::new(FallbackOnly),
            notifier,
        );

        aggregator.get_context(&patient).await;
        assert!(aggregator.get_context(&patient).await.cache_hit);

        handler.handle(&request(&patient, "sudah")).await;
        // The stale snapshot is dropped and the rebuild sees the
        // confirmation that was just written.
        let outcome = aggregator.get_context(&patient).await;
        assert!(!outcome.cache_hit);
        let rebuilt = outcome.context.unwrap();
        let stored = rebuilt
            .active_reminders
            .iter()
            .find(|r| r.id == reminder.id)
            .unwrap();
        assert_eq!(stored.confirmation_status, Some(ConfirmationStatus::Confirmed));
    }

    #[test]
    fn verified_patients_only() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let handler = handler(&store);
        let mut patient = verified_patient(&store);

        assert!(handler.can_handle(InteractionType::ReminderConfirmation, &patient));
        patient.verification_status = VerificationStatus::Pending;
        assert!(!handler.can_handle(InteractionType::ReminderConfirmation, &patient));
    }
}
