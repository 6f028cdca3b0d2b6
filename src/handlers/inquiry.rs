//! General inquiry handler.
//!
//! The slowest path: model classification, a policy decision for anything
//! that would disclose patient data, and an answer composed from the
//! context snapshot or a sub-service. Everything uncertain or explicitly
//! asking for a human goes to the escalation fanout instead of guessing.

use std::sync::Arc;

use async_trait::async_trait;

use super::{HandlerResponse, InteractionHandler, InteractionRequest};
use crate::classify::{fallback, ClassificationService, InquiryClassification};
use crate::compliance::ComplianceCalculator;
use crate::config::LOW_CONFIDENCE_THRESHOLD;
use crate::context::PatientContext;
use crate::models::{EscalationReason, InteractionType, PatientIdentity};
use crate::notify::{EscalationRequest, Notifier};
use crate::policy::{DataAccessRequest, PolicyEngine, RequestedDataType};
use crate::safety::screen_message;

const REPLY_HUMAN: &str = "Baik, petugas kesehatan kami akan segera menghubungi Anda.";
const REPLY_EMERGENCY: &str = "Pesan Anda sudah kami teruskan ke petugas. Jika kondisi \
     darurat, segera hubungi 119 atau datang ke IGD terdekat.";
const REPLY_GENERAL: &str = "Terima kasih atas pesan Anda. Jika ada pertanyaan tentang \
     obat atau jadwal, silakan tanyakan kapan saja.";

/// Patient variable that records a disclosure consent.
const CONSENT_VARIABLE: &str = "persetujuan_data";

pub struct InquiryHandler {
    classifier: Arc<dyn ClassificationService>,
    policy: Arc<PolicyEngine>,
    compliance: Arc<ComplianceCalculator>,
    notifier: Arc<Notifier>,
}

impl InquiryHandler {
    pub fn new(
        classifier: Arc<dyn ClassificationService>,
        policy: Arc<PolicyEngine>,
        compliance: Arc<ComplianceCalculator>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            classifier,
            policy,
            compliance,
            notifier,
        }
    }

    async fn escalate(
        &self,
        request: &InteractionRequest,
        reason: EscalationReason,
        summary: String,
        confidence_percent: Option<f32>,
    ) -> (bool, Option<String>) {
        match self
            .notifier
            .create(EscalationRequest {
                patient_id: request.patient.id,
                reason,
                summary,
                confidence_percent,
            })
            .await
        {
            Ok(_) => (true, None),
            Err(e) => {
                tracing::error!(error = %e, "Inquiry: escalation failed");
                (false, Some(e.to_string()))
            }
        }
    }

    async fn answer_authorized(
        &self,
        request: &InteractionRequest,
        data_type: RequestedDataType,
    ) -> Result<String, String> {
        let context = &request.context;
        let answer = match data_type {
            RequestedDataType::HealthNotes => match context.recent_notes.first() {
                Some(note) => format!(
                    "Catatan terakhir dari petugas ({}): {}",
                    note.recorded_at.format("%d-%m-%Y"),
                    note.content
                ),
                None => "Belum ada catatan kesehatan untuk Anda.".to_string(),
            },
            RequestedDataType::MedicationInfo => {
                if context.active_reminders.is_empty() {
                    "Saat ini tidak ada obat terdaftar untuk Anda.".to_string()
                } else {
                    let titles: Vec<&str> = context
                        .active_reminders
                        .iter()
                        .map(|r| r.title.as_str())
                        .collect();
                    format!("Obat Anda saat ini: {}.", titles.join(", "))
                }
            }
            RequestedDataType::MedicationSchedule => {
                if context.todays_reminders.is_empty() {
                    "Tidak ada jadwal obat untuk hari ini.".to_string()
                } else {
                    let lines: Vec<String> = context
                        .todays_reminders
                        .iter()
                        .map(|r| {
                            format!("{} pukul {}", r.title, r.scheduled_for.format("%H:%M"))
                        })
                        .collect();
                    format!("Jadwal obat hari ini: {}.", lines.join("; "))
                }
            }
            RequestedDataType::MedicationCompliance => {
                let summary = self
                    .compliance
                    .rate(request.patient.id)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, "Inquiry: compliance lookup failed");
                        "Compliance lookup failed".to_string()
                    })?;
                format!(
                    "Tingkat kepatuhan minum obat Anda saat ini {}% \
                     ({} dari {} pengingat terkonfirmasi).",
                    summary.compliance_rate, summary.confirmed_reminders, summary.total_reminders
                )
            }
            RequestedDataType::Reminder => {
                let awaiting = context
                    .active_reminders
                    .iter()
                    .filter(|r| r.awaits_confirmation())
                    .count();
                format!(
                    "Anda punya {} pengingat aktif, {} menunggu konfirmasi.",
                    context.active_reminders.len(),
                    awaiting
                )
            }
            RequestedDataType::General => REPLY_GENERAL.to_string(),
        };
        Ok(answer)
    }
}

fn consent_on_file(context: &PatientContext) -> bool {
    context.active_variables.iter().any(|v| {
        v.name == CONSENT_VARIABLE && matches!(v.value.as_str(), "ya" | "true" | "setuju")
    })
}

#[async_trait]
impl InteractionHandler for InquiryHandler {
    fn priority(&self) -> u8 {
        30
    }

    fn can_handle(&self, interaction: InteractionType, patient: &PatientIdentity) -> bool {
        interaction == InteractionType::GeneralInquiry && patient.is_verified()
    }

    async fn handle(&self, request: &InteractionRequest) -> HandlerResponse {
        // Screened again even though the engine already did: this handler
        // must stay safe if a caller reaches it directly.
        let screen = screen_message(&request.message);
        if screen.is_emergency {
            let (escalated, error) = self
                .escalate(
                    request,
                    EscalationReason::EmergencyDetection,
                    format!("Indikasi darurat: {}", screen.indicators.join("; ")),
                    None,
                )
                .await;
            return HandlerResponse {
                processed: true,
                action: Some("inquiry_emergency_escalated".to_string()),
                reply: Some(REPLY_EMERGENCY.to_string()),
                escalated,
                error,
            };
        }

        let classification: InquiryClassification = match self
            .classifier
            .classify_inquiry(&request.message, &request.context)
            .await
        {
            Ok(classification) => classification,
            Err(e) => {
                tracing::warn!(error = %e, "Inquiry: classifier failed, keyword fallback");
                fallback::classify_inquiry(&request.message)
            }
        };

        if classification.needs_human_help {
            let (escalated, error) = self
                .escalate(
                    request,
                    EscalationReason::ComplexInquiry,
                    "Pasien meminta berbicara dengan petugas".to_string(),
                    None,
                )
                .await;
            return HandlerResponse {
                processed: true,
                action: Some("inquiry_human_requested".to_string()),
                reply: Some(REPLY_HUMAN.to_string()),
                escalated,
                error,
            };
        }

        if classification.confidence < LOW_CONFIDENCE_THRESHOLD {
            let (escalated, error) = self
                .escalate(
                    request,
                    EscalationReason::LowConfidence,
                    "Pertanyaan tidak dapat diklasifikasikan dengan yakin".to_string(),
                    Some(classification.confidence * 100.0),
                )
                .await;
            return HandlerResponse {
                processed: true,
                action: Some("inquiry_low_confidence_escalated".to_string()),
                reply: Some(REPLY_HUMAN.to_string()),
                escalated,
                error,
            };
        }

        let Some(data_type) = classification.data_type else {
            return HandlerResponse {
                processed: true,
                action: Some("inquiry_answered".to_string()),
                reply: Some(REPLY_GENERAL.to_string()),
                escalated: false,
                error: None,
            };
        };

        let decision = self.policy.validate(&DataAccessRequest {
            patient_id: request.patient.id,
            requester_id: request.patient.id,
            requester_verified: request.patient.is_verified(),
            data_type,
            consent_on_file: consent_on_file(&request.context),
        });

        if !decision.is_authorized {
            let (escalated, error) = if decision.requires_escalation {
                self.escalate(
                    request,
                    EscalationReason::Other,
                    format!("Permintaan data ditolak: {}", decision.violations.join(", ")),
                    None,
                )
                .await
            } else {
                (false, None)
            };
            return HandlerResponse {
                processed: true,
                action: Some("inquiry_access_denied".to_string()),
                reply: decision.denial_message,
                escalated,
                error,
            };
        }

        match self.answer_authorized(request, data_type).await {
            Ok(reply) => HandlerResponse {
                processed: true,
                action: Some("inquiry_answered".to_string()),
                reply: Some(reply),
                escalated: false,
                error: None,
            },
            Err(error) => HandlerResponse::failure(&error),
        }
    }
}
