//! HTTP classification client for a local Ollama-compatible backend.

use serde::{Deserialize, Serialize};

use super::{
    extract_json_object, ClassificationService, ClassifyError, ConfirmationClassification,
    InquiryClassification, RawConfirmationPayload, RawInquiryPayload, RawVerificationPayload,
    VerificationClassification,
};
use crate::context::PatientContext;

const VERIFICATION_SYSTEM: &str = "Classify the patient's reply to a program \
enrollment question. Answer with JSON: {\"response\": \"YES\"|\"NO\"|\"UNCERTAIN\", \
\"confidence\": 0.0-1.0, \"needs_human_help\": bool}. The patient writes in \
Indonesian or English.";

const CONFIRMATION_SYSTEM: &str = "Classify the patient's reply to a medication \
reminder. Answer with JSON: {\"response\": \"CONFIRMED\"|\"MISSED\"|\"HELP_NEEDED\", \
\"confidence\": 0.0-1.0}. The patient writes in Indonesian or English.";

const INQUIRY_SYSTEM: &str = "Classify a patient's free-form question. Answer with \
JSON: {\"topic\": string, \"data_access_required\": bool, \"patient_data_type\": \
\"health_notes\"|\"medication_info\"|\"medication_schedule\"|\"medication_compliance\"|\
\"reminder\"|\"general\", \"needs_human_help\": bool, \"follow_up_required\": bool, \
\"confidence\": 0.0-1.0}. The patient writes in Indonesian or English.";

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct ModelClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl ModelClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClassifyError::Connection(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    /// Local backend at the conventional Ollama port, 30s per request.
    pub fn default_local() -> Result<Self, ClassifyError> {
        Self::new("http://localhost:11434", "gemma3:4b", 30)
    }

    /// Read backend location and model from `PEDULI_MODEL_URL` /
    /// `PEDULI_MODEL`, falling back to the local defaults.
    pub fn from_env() -> Result<Self, ClassifyError> {
        let base_url = std::env::var("PEDULI_MODEL_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        let model = std::env::var("PEDULI_MODEL").unwrap_or_else(|_| "gemma3:4b".to_string());
        Self::new(&base_url, &model, 30)
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ClassifyError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_connect() {
                ClassifyError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                ClassifyError::Timeout(self.timeout_secs)
            } else {
                ClassifyError::ResponseParsing(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::ResponseParsing(e.to_string()))?;
        Ok(parsed.response)
    }

    fn prompt(message: &str, context: &PatientContext) -> String {
        // The message body goes only to the backend, never into logs.
        format!(
            "Patient language: {}\nPending reminders: {}\nMessage: {}",
            context.profile.preferred_language,
            context
                .active_reminders
                .iter()
                .filter(|r| r.awaits_confirmation())
                .count(),
            message
        )
    }
}

#[async_trait::async_trait]
impl ClassificationService for ModelClient {
    async fn classify_verification(
        &self,
        message: &str,
        context: &PatientContext,
    ) -> Result<VerificationClassification, ClassifyError> {
        let output = self
            .generate(VERIFICATION_SYSTEM, &Self::prompt(message, context))
            .await?;
        let raw: RawVerificationPayload = serde_json::from_str(extract_json_object(&output)?)
            .map_err(|e| ClassifyError::InvalidPayload(e.to_string()))?;
        Ok(raw.validate())
    }

    async fn classify_confirmation(
        &self,
        message: &str,
        context: &PatientContext,
    ) -> Result<ConfirmationClassification, ClassifyError> {
        let output = self
            .generate(CONFIRMATION_SYSTEM, &Self::prompt(message, context))
            .await?;
        let raw: RawConfirmationPayload = serde_json::from_str(extract_json_object(&output)?)
            .map_err(|e| ClassifyError::InvalidPayload(e.to_string()))?;
        Ok(raw.validate())
    }

    async fn classify_inquiry(
        &self,
        message: &str,
        context: &PatientContext,
    ) -> Result<InquiryClassification, ClassifyError> {
        let output = self
            .generate(INQUIRY_SYSTEM, &Self::prompt(message, context))
            .await?;
        let raw: RawInquiryPayload = serde_json::from_str(extract_json_object(&output)?)
            .map_err(|e| ClassifyError::InvalidPayload(e.to_string()))?;
        Ok(raw.validate())
    }
}
