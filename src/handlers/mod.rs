//! Interaction handlers and their dispatch registry.
//!
//! The registry is built once at startup from an ordered set of handlers;
//! dispatch is a linear scan in priority order and the first handler whose
//! `can_handle` accepts the interaction wins. No handler matching means
//! the engine reports the message unhandled; there is no catch-all.

pub mod inquiry;
pub mod reminder;
pub mod verification;

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::PatientContext;
use crate::models::{InteractionType, PatientIdentity};

pub use inquiry::InquiryHandler;
pub use reminder::ReminderHandler;
pub use verification::VerificationHandler;

/// Everything a handler gets for one message.
#[derive(Debug, Clone)]
pub struct InteractionRequest {
    pub message: String,
    pub patient: PatientIdentity,
    pub context: PatientContext,
}

/// What a handler did with the message.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub processed: bool,
    /// Machine-readable label of the action taken, e.g. "verification_confirmed".
    pub action: Option<String>,
    /// Patient-facing reply text, if one should be sent.
    pub reply: Option<String>,
    pub escalated: bool,
    pub error: Option<String>,
}

impl HandlerResponse {
    pub fn failure(error: &str) -> Self {
        Self {
            processed: false,
            action: None,
            reply: None,
            escalated: false,
            error: Some(error.to_string()),
        }
    }
}

#[async_trait]
pub trait InteractionHandler: Send + Sync {
    /// Lower runs first.
    fn priority(&self) -> u8;

    fn can_handle(&self, interaction: InteractionType, patient: &PatientIdentity) -> bool;

    async fn handle(&self, request: &InteractionRequest) -> HandlerResponse;
}

pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn InteractionHandler>>,
}

impl HandlerRegistry {
    /// Build the registry, ordering handlers by ascending priority.
    pub fn new(mut handlers: Vec<Arc<dyn InteractionHandler>>) -> Self {
        handlers.sort_by_key(|h| h.priority());
        Self { handlers }
    }

    /// First handler accepting this interaction, or None when the message
    /// falls through to the caller.
    pub async fn dispatch(
        &self,
        interaction: InteractionType,
        request: &InteractionRequest,
    ) -> Option<HandlerResponse> {
        for handler in &self.handlers {
            if handler.can_handle(interaction, &request.patient) {
                tracing::debug!(
                    interaction = interaction.as_str(),
                    priority = handler.priority(),
                    "Dispatching to handler"
                );
                return Some(handler.handle(request).await);
            }
        }
        tracing::debug!(interaction = interaction.as_str(), "No handler matched");
        None
    }
}
