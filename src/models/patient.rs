use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::VerificationStatus;

/// A patient's stable identity record.
///
/// Created on first contact or staff onboarding. Soft-deleted only:
/// `deleted_at` is set, the row never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub id: Uuid,
    pub name: String,
    /// Phone number as originally registered (one representation of many).
    pub phone: String,
    pub verification_status: VerificationStatus,
    pub verification_responded_at: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

impl PatientIdentity {
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    pub fn is_pending_verification(&self) -> bool {
        self.verification_status == VerificationStatus::Pending
    }
}

/// Program-facing profile, read alongside the identity when building context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient_id: Uuid,
    pub name: String,
    pub phone: String,
    /// BCP-47-ish language tag, "id" for the primary population.
    pub preferred_language: String,
    pub enrolled_program: Option<String>,
}

/// A staff-maintained key/value observation about a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientVariable {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub value: String,
    pub is_active: bool,
    pub updated_at: NaiveDateTime,
}

/// A free-text clinical note entered by program staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthNote {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub note_type: Option<String>,
    pub content: String,
    pub recorded_at: NaiveDateTime,
}
