//! Enrollment verification handler.
//!
//! Only pending-verification patients reach this handler. An affirmative
//! or negative reply persists the new status and the response timestamp;
//! anything else leaves the record untouched.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;

use super::{HandlerResponse, InteractionHandler, InteractionRequest};
use crate::classify::{fallback, ClassificationService, VerificationReply};
use crate::context::ContextAggregator;
use crate::models::{InteractionType, PatientIdentity, VerificationStatus};
use crate::store::PatientStore;

const REPLY_WELCOME: &str = "Terima kasih! Pendaftaran Anda sudah kami konfirmasi. \
     Kami akan mengirimkan pengingat obat sesuai jadwal Anda.";
const REPLY_DECLINED: &str = "Baik, kami tidak akan mengirimkan pesan lagi. \
     Jika berubah pikiran, silakan hubungi puskesmas Anda.";
const REPLY_CLARIFY: &str = "Mohon balas \"ya\" jika Anda bersedia mengikuti program \
     pengingat obat, atau \"tidak\" jika tidak bersedia.";

pub struct VerificationHandler {
    patients: Arc<dyn PatientStore>,
    aggregator: Arc<ContextAggregator>,
    classifier: Arc<dyn ClassificationService>,
}

impl VerificationHandler {
    pub fn new(
        patients: Arc<dyn PatientStore>,
        aggregator: Arc<ContextAggregator>,
        classifier: Arc<dyn ClassificationService>,
    ) -> Self {
        Self {
            patients,
            aggregator,
            classifier,
        }
    }

    async fn persist_status(
        &self,
        request: &InteractionRequest,
        status: VerificationStatus,
    ) -> Result<(), crate::store::StoreError> {
        self.patients
            .update_verification(request.patient.id, status, Local::now().naive_local())
            .await?;
        // Invalidate after the write lands: a rebuild racing this call must
        // not re-cache the pre-mutation snapshot for a full TTL.
        self.aggregator.invalidate(&request.patient).await;
        Ok(())
    }
}

#[async_trait]
impl InteractionHandler for VerificationHandler {
    fn priority(&self) -> u8 {
        10
    }

    fn can_handle(&self, interaction: InteractionType, patient: &PatientIdentity) -> bool {
        interaction == InteractionType::Verification && patient.is_pending_verification()
    }

    async fn handle(&self, request: &InteractionRequest) -> HandlerResponse {
        let classification = match self
            .classifier
            .classify_verification(&request.message, &request.context)
            .await
        {
            Ok(classification) => classification,
            Err(e) => {
                tracing::warn!(error = %e, "Verification: classifier failed, keyword fallback");
                fallback::classify_verification(&request.message)
            }
        };

        let (status, action, reply) = match classification.reply {
            VerificationReply::Yes => (
                VerificationStatus::Verified,
                "verification_confirmed",
                REPLY_WELCOME,
            ),
            VerificationReply::No => (
                VerificationStatus::Declined,
                "verification_declined",
                REPLY_DECLINED,
            ),
            VerificationReply::Uncertain => {
                return HandlerResponse {
                    processed: false,
                    action: None,
                    reply: Some(REPLY_CLARIFY.to_string()),
                    escalated: false,
                    error: Some("Verification reply not recognized".to_string()),
                };
            }
        };

        if let Err(e) = self.persist_status(request, status).await {
            tracing::error!(error = %e, "Verification: status update failed");
            return HandlerResponse::failure("Verification status update failed");
        }

        tracing::info!(
            status = status.as_str(),
            confidence = classification.confidence,
            "Verification resolved"
        );
        HandlerResponse {
            processed: true,
            action: Some(action.to_string()),
            reply: Some(reply.to_string()),
            escalated: false,
            error: None,
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
    use crate::store::SqliteStore;

    /// Classifier returning a fixed verification result, or failing to
    /// exercise the fallback path.
    struct MockClassifier {
        verification: Option<VerificationClassification>,
    }

    impl MockClassifier {
        fn failing() -> Self {
            Self { verification: None }
        }

        fn fixed(result: VerificationClassification) -> Self {
            Self {
                verification: Some(result),
            }
        }
    }

    #[async_trait]
    impl ClassificationService for MockClassifier {
        async fn classify_verification(
            &self,
            _message: &str,
            _context: &PatientContext,
        ) -> Result<VerificationClassification, ClassifyError> {
            self.verification
                .clone()
                .ok_or_else(|| ClassifyError::Connection("mock".into()))
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

    fn pending_patient(store: &SqliteStore) -> PatientIdentity {
        let patient = PatientIdentity {
            id: Uuid::new_v4(),
            name: "Ibu Rina".into(),
            phone: "+628123456789".into(),
            verification_status: VerificationStatus::Pending,
            verification_responded_at: None,
            is_active: true,
            created_at: Local::now().naive_local(),
            deleted_at: None,
        };
        store.insert_patient(&patient).unwrap();
        patient
    }

    fn handler(
        store: &std::sync::Arc<SqliteStore>,
        classifier: MockClassifier,
    ) -> VerificationHandler {
        let aggregator = Arc::new(ContextAggregator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(InMemoryContextCache::new()),
        ));
        VerificationHandler::new(store.clone(), aggregator, Arc::new(classifier))
    }

    async fn run(
        handler: &VerificationHandler,
        store: &SqliteStore,
        patient: &PatientIdentity,
        message: &str,
    ) -> (HandlerResponse, PatientIdentity) {
        let request = InteractionRequest {
            message: message.into(),
            patient: patient.clone(),
            context: crate::context::test_support::empty_context(),
        };
        let response = handler.handle(&request).await;
        let stored = store.patient(patient.id).await.unwrap().unwrap();
        (response, stored)
    }

    #[tokio::test]
    async fn affirmative_verifies_and_timestamps() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = pending_patient(&store);
        let handler = handler(&store, MockClassifier::failing());

        let (response, stored) = run(&handler, &store, &patient, "iya, saya bersedia").await;
        assert!(response.processed);
        assert_eq!(response.action.as_deref(), Some("verification_confirmed"));
        assert_eq!(stored.verification_status, VerificationStatus::Verified);
        assert!(stored.verification_responded_at.is_some());
    }

    #[tokio::test]
    async fn negative_declines() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = pending_patient(&store);
        let handler = handler(&store, MockClassifier::failing());

        let (response, stored) = run(&handler, &store, &patient, "tidak mau").await;
        assert!(response.processed);
        assert_eq!(stored.verification_status, VerificationStatus::Declined);
    }

    #[tokio::test]
    async fn unrecognized_reply_mutates_nothing() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = pending_patient(&store);
        let handler = handler(&store, MockClassifier::failing());

        let (response, stored) = run(&handler, &store, &patient, "siapa ini?").await;
        assert!(!response.processed);
        assert!(response.error.is_some());
        assert!(response.reply.is_some());
        assert_eq!(stored.verification_status, VerificationStatus::Pending);
        assert!(stored.verification_responded_at.is_none());
    }

    #[tokio::test]
    async fn model_result_preferred_over_keywords() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = pending_patient(&store);
        // The message reads like a refusal, but the model saw agreement in
        // the full phrasing; the model wins.
        let handler = handler(
            &store,
            MockClassifier::fixed(VerificationClassification {
                reply: VerificationReply::Yes,
                confidence: 0.95,
                needs_human_help: false,
            }),
        );

        let (response, stored) = run(&handler, &store, &patient, "kenapa tidak, boleh saja").await;
        assert!(response.processed);
        assert_eq!(stored.verification_status, VerificationStatus::Verified);
    }

    #[tokio::test]
    async fn status_write_invalidates_cached_context() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let patient = pending_patient(&store);
        let aggregator = Arc::new(ContextAggregator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(InMemoryContextCache::new()),
        ));
        let handler = VerificationHandler::new(
            store.clone(),
            aggregator.clone(),
            Arc::new(MockClassifier::failing()),
        );

        aggregator.get_context(&patient).await;
        assert!(aggregator.get_context(&patient).await.cache_hit);

        let (response, _) = run(&handler, &store, &patient, "iya, saya bersedia").await;
        assert!(response.processed);
        // The snapshot cached before the mutation is gone; the next lookup
        // rebuilds from the store.
        assert!(!aggregator.get_context(&patient).await.cache_hit);
    }

    #[test]
    fn only_pending_patients_accepted() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let handler = handler(&store, MockClassifier::failing());
        let mut patient = pending_patient(&store);

        assert!(handler.can_handle(InteractionType::Verification, &patient));
        patient.verification_status = VerificationStatus::Verified;
        assert!(!handler.can_handle(InteractionType::Verification, &patient));
        patient.verification_status = VerificationStatus::Pending;
        assert!(!handler.can_handle(InteractionType::GeneralInquiry, &patient));
    }
}
