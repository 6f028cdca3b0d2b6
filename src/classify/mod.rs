//! Message classification behind a service seam.
//!
//! Handlers never consume a model response directly. The raw payload is
//! untrusted: it goes through schema validation and clamping here and comes
//! out as one of the typed classification results below, with safe defaults
//! for anything missing or out of range. When the service itself fails,
//! handlers fall back to the versioned keyword classifiers in `fallback`,
//! which produce the same types.

pub mod fallback;
pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::context::PatientContext;
use crate::policy::RequestedDataType;

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Cannot connect to classification backend at {0}")]
    Connection(String),

    #[error("Classification request timed out after {0}s")]
    Timeout(u64),

    #[error("Classification backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Failed to parse classification response: {0}")]
    ResponseParsing(String),

    #[error("Classification payload invalid: {0}")]
    InvalidPayload(String),
}

// ═══════════════════════════════════════════════════════════
// Typed results
// ═══════════════════════════════════════════════════════════

/// What a pending-verification patient answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationReply {
    Yes,
    No,
    Uncertain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationClassification {
    pub reply: VerificationReply,
    /// 0.0–1.0, clamped.
    pub confidence: f32,
    pub needs_human_help: bool,
}

/// What a patient replied to a delivered reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationReply {
    Confirmed,
    Missed,
    HelpNeeded,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationClassification {
    pub reply: ConfirmationReply,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InquiryClassification {
    /// Free-form topic label, informational only.
    pub topic: Option<String>,
    /// Set when answering requires disclosing patient data.
    pub data_type: Option<RequestedDataType>,
    pub needs_human_help: bool,
    pub follow_up_required: bool,
    pub confidence: f32,
}

// ═══════════════════════════════════════════════════════════
// Service seam
// ═══════════════════════════════════════════════════════════

/// Model-backed classification. Implementations must return already
/// validated and clamped results; callers treat any `Err` as a signal to
/// use the keyword fallback.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    async fn classify_verification(
        &self,
        message: &str,
        context: &PatientContext,
    ) -> Result<VerificationClassification, ClassifyError>;

    async fn classify_confirmation(
        &self,
        message: &str,
        context: &PatientContext,
    ) -> Result<ConfirmationClassification, ClassifyError>;

    async fn classify_inquiry(
        &self,
        message: &str,
        context: &PatientContext,
    ) -> Result<InquiryClassification, ClassifyError>;
}

// ═══════════════════════════════════════════════════════════
// Payload validation
// ═══════════════════════════════════════════════════════════

/// Raw wire payload for a verification classification. Untrusted.
#[derive(Debug, Deserialize)]
pub struct RawVerificationPayload {
    pub response: Option<String>,
    pub confidence: Option<f32>,
    pub needs_human_help: Option<bool>,
}

/// Raw wire payload for a reminder-confirmation classification. Untrusted.
#[derive(Debug, Deserialize)]
pub struct RawConfirmationPayload {
    pub response: Option<String>,
    pub confidence: Option<f32>,
}

/// Raw wire payload for a general-inquiry classification. Untrusted.
#[derive(Debug, Deserialize)]
pub struct RawInquiryPayload {
    pub topic: Option<String>,
    pub data_access_required: Option<bool>,
    pub patient_data_type: Option<String>,
    pub needs_human_help: Option<bool>,
    pub follow_up_required: Option<bool>,
    pub confidence: Option<f32>,
}

fn clamp_confidence(raw: Option<f32>) -> f32 {
    let c = raw.unwrap_or(0.0);
    if c.is_finite() {
        c.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl RawVerificationPayload {
    /// Unknown response values collapse to Uncertain with zero confidence.
    pub fn validate(self) -> VerificationClassification {
        let (reply, confidence) = match self.response.as_deref() {
            Some("YES") => (VerificationReply::Yes, clamp_confidence(self.confidence)),
            Some("NO") => (VerificationReply::No, clamp_confidence(self.confidence)),
            Some("UNCERTAIN") => (VerificationReply::Uncertain, clamp_confidence(self.confidence)),
            other => {
                if let Some(value) = other {
                    tracing::debug!(value, "Verification payload: unknown response value");
                }
                (VerificationReply::Uncertain, 0.0)
            }
        };
        VerificationClassification {
            reply,
            confidence,
            needs_human_help: self.needs_human_help.unwrap_or(false),
        }
    }
}

impl RawConfirmationPayload {
    pub fn validate(self) -> ConfirmationClassification {
        let (reply, confidence) = match self.response.as_deref() {
            Some("CONFIRMED") => (ConfirmationReply::Confirmed, clamp_confidence(self.confidence)),
            Some("MISSED") => (ConfirmationReply::Missed, clamp_confidence(self.confidence)),
            Some("HELP_NEEDED") => {
                (ConfirmationReply::HelpNeeded, clamp_confidence(self.confidence))
            }
            _ => (ConfirmationReply::Unrecognized, 0.0),
        };
        ConfirmationClassification { reply, confidence }
    }
}

impl RawInquiryPayload {
    /// An unparseable data type is dropped rather than guessed: no policy
    /// check will run and no data will be disclosed for it.
    pub fn validate(self) -> InquiryClassification {
        let data_type = if self.data_access_required.unwrap_or(false) {
            match self.patient_data_type.as_deref().map(RequestedDataType::parse) {
                Some(Some(dt)) => Some(dt),
                Some(None) => {
                    tracing::debug!("Inquiry payload: unknown data type dropped");
                    None
                }
                None => None,
            }
        } else {
            None
        };
        InquiryClassification {
            topic: self.topic.filter(|t| !t.trim().is_empty()),
            data_type,
            needs_human_help: self.needs_human_help.unwrap_or(false),
            follow_up_required: self.follow_up_required.unwrap_or(false),
            confidence: clamp_confidence(self.confidence),
        }
    }
}

/// Extract the first JSON object embedded in free-form model output.
pub(crate) fn extract_json_object(text: &str) -> Result<&str, ClassifyError> {
    let start = text
        .find('{')
        .ok_or_else(|| ClassifyError::ResponseParsing("No JSON object in response".into()))?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    Err(ClassifyError::ResponseParsing(
        "Unterminated JSON object in response".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Verification payloads ────────────────────────────

    #[test]
    fn verification_yes_validates() {
        let raw = RawVerificationPayload {
            response: Some("YES".into()),
            confidence: Some(0.92),
            needs_human_help: Some(false),
        };
        let result = raw.validate();
        assert_eq!(result.reply, VerificationReply::Yes);
        assert!((result.confidence - 0.92).abs() < f32::EPSILON);
    }

    #[test]
    fn unknown_response_collapses_to_uncertain() {
        let raw = RawVerificationPayload {
            response: Some("MAYBE".into()),
            confidence: Some(0.99),
            needs_human_help: None,
        };
        let result = raw.validate();
        assert_eq!(result.reply, VerificationReply::Uncertain);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn confidence_is_clamped() {
        let raw = RawVerificationPayload {
            response: Some("NO".into()),
            confidence: Some(3.5),
            needs_human_help: None,
        };
        assert_eq!(raw.validate().confidence, 1.0);

        let raw = RawVerificationPayload {
            response: Some("NO".into()),
            confidence: Some(f32::NAN),
            needs_human_help: None,
        };
        assert_eq!(raw.validate().confidence, 0.0);
    }

    #[test]
    fn missing_fields_default_safely() {
        let raw = RawVerificationPayload {
            response: None,
            confidence: None,
            needs_human_help: None,
        };
        let result = raw.validate();
        assert_eq!(result.reply, VerificationReply::Uncertain);
        assert!(!result.needs_human_help);
    }

    // ── Confirmation payloads ────────────────────────────

    #[test]
    fn confirmation_values_map() {
        for (wire, expected) in [
            ("CONFIRMED", ConfirmationReply::Confirmed),
            ("MISSED", ConfirmationReply::Missed),
            ("HELP_NEEDED", ConfirmationReply::HelpNeeded),
            ("garbage", ConfirmationReply::Unrecognized),
        ] {
            let raw = RawConfirmationPayload {
                response: Some(wire.into()),
                confidence: Some(0.8),
            };
            assert_eq!(raw.validate().reply, expected, "wire: {wire}");
        }
    }

    // ── Inquiry payloads ─────────────────────────────────

    #[test]
    fn inquiry_data_type_parsed_when_access_required() {
        let raw = RawInquiryPayload {
            topic: Some("medication".into()),
            data_access_required: Some(true),
            patient_data_type: Some("medication_schedule".into()),
            needs_human_help: None,
            follow_up_required: None,
            confidence: Some(0.7),
        };
        let result = raw.validate();
        assert_eq!(result.data_type, Some(RequestedDataType::MedicationSchedule));
    }

    #[test]
    fn unknown_data_type_is_dropped_not_guessed() {
        let raw = RawInquiryPayload {
            topic: None,
            data_access_required: Some(true),
            patient_data_type: Some("lab_results".into()),
            needs_human_help: None,
            follow_up_required: None,
            confidence: Some(0.9),
        };
        assert_eq!(raw.validate().data_type, None);
    }

    #[test]
    fn data_type_ignored_without_access_flag() {
        let raw = RawInquiryPayload {
            topic: None,
            data_access_required: Some(false),
            patient_data_type: Some("health_notes".into()),
            needs_human_help: None,
            follow_up_required: None,
            confidence: None,
        };
        assert_eq!(raw.validate().data_type, None);
    }

    #[test]
    fn blank_topic_dropped() {
        let raw = RawInquiryPayload {
            topic: Some("   ".into()),
            data_access_required: None,
            patient_data_type: None,
            needs_human_help: None,
            follow_up_required: None,
            confidence: None,
        };
        assert_eq!(raw.validate().topic, None);
    }

    // ── JSON extraction ──────────────────────────────────

    #[test]
    fn extracts_json_from_chatter() {
        let text = "Sure! Here is the result:\n{\"response\": \"YES\", \"confidence\": 0.9}\nHope that helps.";
        let json = extract_json_object(text).unwrap();
        assert_eq!(json, "{\"response\": \"YES\", \"confidence\": 0.9}");
    }

    #[test]
    fn extracts_nested_objects() {
        let text = "{\"a\": {\"b\": 1}, \"c\": \"x}\"}";
        assert_eq!(extract_json_object(text).unwrap(), text);
    }

    #[test]
    fn missing_json_is_an_error() {
        assert!(extract_json_object("no structured output here").is_err());
        assert!(extract_json_object("{\"unterminated\": true").is_err());
    }
}
