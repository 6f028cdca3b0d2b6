//! Pipeline orchestration.
//!
//! One inbound message runs: input validation → identity resolution →
//! emergency screen → interaction-type derivation → handler dispatch.
//! The screen sits before any handler and short-circuits the rest of the
//! pipeline; nothing past this module's boundary ever sees a panic or a
//! raw error from a collaborator.

use std::sync::Arc;

use crate::cache::ContextCache;
use crate::classify::{fallback, ClassificationService, ConfirmationReply};
use crate::compliance::ComplianceCalculator;
use crate::context::ContextAggregator;
use crate::handlers::{
    HandlerRegistry, InquiryHandler, InteractionRequest, ReminderHandler, VerificationHandler,
};
use crate::models::{EscalationReason, InteractionType, PatientIdentity};
use crate::notify::{EscalationRequest, Notifier, NotifierConfig};
use crate::policy::{PolicyConfig, PolicyEngine};
use crate::resolver::IdentityResolver;
use crate::safety::screen_message;
use crate::store::{ConversationStore, NotificationStore, PatientStore, ReminderStore};
use crate::transport::MessagingTransport;

const REPLY_EMERGENCY: &str = "Pesan Anda sudah kami teruskan ke petugas. Jika kondisi \
     darurat, segera hubungi 119 atau datang ke IGD terdekat.";

/// One message as handed over by the inbound transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Sender phone in whatever format the transport delivered.
    pub sender: String,
    pub body: String,
}

/// Structured outcome of one pipeline execution.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionResponse {
    pub processed: bool,
    pub interaction: InteractionType,
    pub action: Option<String>,
    pub reply: Option<String>,
    pub emergency_detected: bool,
    pub escalated: bool,
    pub error: Option<String>,
}

impl InteractionResponse {
    fn rejected(error: &str) -> Self {
        Self {
            processed: false,
            interaction: InteractionType::Unclassified,
            action: None,
            reply: None,
            emergency_detected: false,
            escalated: false,
            error: Some(error.to_string()),
        }
    }
}

/// Everything the engine needs, injected by the host.
pub struct EngineDeps {
    pub patients: Arc<dyn PatientStore>,
    pub reminders: Arc<dyn ReminderStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub cache: Arc<dyn ContextCache>,
    pub classifier: Arc<dyn ClassificationService>,
    pub transport: Arc<dyn MessagingTransport>,
    pub notifier_config: NotifierConfig,
    pub policy_config: PolicyConfig,
}

pub struct InteractionEngine {
    resolver: IdentityResolver,
    aggregator: Arc<ContextAggregator>,
    registry: HandlerRegistry,
    notifier: Arc<Notifier>,
}

impl InteractionEngine {
    /// Wire the full pipeline. The handler registry is built once here.
    pub fn new(deps: EngineDeps) -> Self {
        let aggregator = Arc::new(ContextAggregator::new(
            deps.patients.clone(),
            deps.reminders.clone(),
            deps.conversations.clone(),
            deps.cache,
        ));
        let notifier = Arc::new(Notifier::new(
            deps.patients.clone(),
            deps.notifications,
            deps.transport,
            deps.notifier_config,
        ));
        let registry = HandlerRegistry::new(vec![
            Arc::new(VerificationHandler::new(
                deps.patients.clone(),
                aggregator.clone(),
                deps.classifier.clone(),
            )),
            Arc::new(ReminderHandler::new(
                deps.reminders.clone(),
                aggregator.clone(),
                deps.classifier.clone(),
                notifier.clone(),
            )),
            Arc::new(InquiryHandler::new(
                deps.classifier,
                Arc::new(PolicyEngine::new(deps.policy_config)),
                Arc::new(ComplianceCalculator::new(deps.reminders)),
                notifier.clone(),
            )),
        ]);

        Self {
            resolver: IdentityResolver::new(deps.patients),
            aggregator,
            registry,
            notifier,
        }
    }

    /// Run the pipeline over one inbound message.
    pub async fn process_message(&self, inbound: &InboundMessage) -> InteractionResponse {
        let sender = inbound.sender.trim();
        let body = inbound.body.trim();
        if sender.is_empty() || body.is_empty() {
            return InteractionResponse::rejected("Empty sender or message body");
        }

        let resolved = self.resolver.resolve(sender).await;

        // Safety first, whatever the message looks like.
        let screen = screen_message(body);
        if screen.is_emergency {
            return self.escalate_emergency(resolved.patient.as_ref(), &screen).await;
        }

        let Some(patient) = resolved.patient else {
            if resolved.store_failed {
                return InteractionResponse::rejected("Identity lookup unavailable");
            }
            tracing::info!(
                attempted = resolved.attempted_formats.len() + 1,
                "Message from unknown sender dropped"
            );
            return InteractionResponse::rejected("Sender not recognized");
        };

        let outcome = self.aggregator.get_context(&patient).await;
        let Some(context) = outcome.context else {
            return InteractionResponse::rejected("Context unavailable");
        };

        let interaction = derive_interaction(&patient, body);
        let request = InteractionRequest {
            message: body.to_string(),
            patient,
            context,
        };

        match self.registry.dispatch(interaction, &request).await {
            Some(handled) => InteractionResponse {
                processed: handled.processed,
                interaction,
                action: handled.action,
                reply: handled.reply,
                emergency_detected: false,
                escalated: handled.escalated,
                error: handled.error,
            },
            None => InteractionResponse {
                processed: false,
                interaction,
                action: None,
                reply: None,
                emergency_detected: false,
                escalated: false,
                error: Some("No handler for this interaction".to_string()),
            },
        }
    }

    async fn escalate_emergency(
        &self,
        patient: Option<&PatientIdentity>,
        screen: &crate::safety::ScreenResult,
    ) -> InteractionResponse {
        let Some(patient) = patient else {
            // The fanout needs a resolved patient row. Nothing to attach the
            // escalation to, so surface it loudly in the logs instead.
            tracing::warn!(
                indicator_count = screen.indicators.len(),
                "Emergency indicators from unresolved sender; cannot escalate"
            );
            return InteractionResponse {
                processed: false,
                interaction: InteractionType::Unclassified,
                action: None,
                reply: Some(REPLY_EMERGENCY.to_string()),
                emergency_detected: true,
                escalated: false,
                error: Some("Sender not recognized; emergency not escalated".to_string()),
            };
        };

        let escalated = self
            .notifier
            .create(EscalationRequest {
                patient_id: patient.id,
                reason: EscalationReason::EmergencyDetection,
                summary: format!("Indikasi darurat: {}", screen.indicators.join("; ")),
                confidence_percent: None,
            })
            .await;
        if let Err(e) = &escalated {
            tracing::error!(error = %e, "Emergency escalation failed");
        }

        InteractionResponse {
            processed: true,
            interaction: InteractionType::Unclassified,
            action: Some("emergency_escalated".to_string()),
            reply: Some(REPLY_EMERGENCY.to_string()),
            emergency_detected: true,
            escalated: escalated.is_ok(),
            error: escalated.err().map(|e| e.to_string()),
        }
    }
}

/// Derive the interaction type from patient state and message shape.
///
/// Pending patients are always in the verification flow. For verified
/// patients a message counts as a reminder confirmation whenever the
/// keyword tables recognize the reply; the reminder handler itself rejects
/// it without mutation when nothing is awaiting confirmation, so a stray
/// "sudah" never reaches the inquiry path and its escalation rules.
fn derive_interaction(patient: &PatientIdentity, body: &str) -> InteractionType {
    if patient.is_pending_verification() {
        return InteractionType::Verification;
    }
    if fallback::classify_confirmation(body).reply != ConfirmationReply::Unrecognized {
        return InteractionType::ReminderConfirmation;
    }
    InteractionType::GeneralInquiry
}
