use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MessageDirection;

/// One conversation between a patient and the program.
///
/// Threads and messages are written by the transport layer; the engine only
/// reads them when building patient context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationThread {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub started_at: NaiveDateTime,
    pub last_message_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub direction: MessageDirection,
    pub body: String,
    pub detected_intent: Option<String>,
    pub intent_confidence: Option<f32>,
    pub sent_at: NaiveDateTime,
}
