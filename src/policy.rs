//! Data-exposure policy engine.
//!
//! Default-deny cascade, checked in order:
//! 1. Cross-patient request → CRITICAL, deny, escalate
//! 2. Unverified requester → HIGH, deny
//! 3. Data type needs consent and none on file → deny (consent request)
//! 4. Data type disabled for the program → deny (restricted-access message)
//! 5. Otherwise → authorize, log the grant
//!
//! Decisions are computed fresh per call and never cached or reused: the
//! decision object is ephemeral and carries everything the handler needs
//! to phrase a denial without touching the underlying data.

use std::collections::HashSet;

use uuid::Uuid;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Closed enumeration of disclosable data categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestedDataType {
    HealthNotes,
    MedicationInfo,
    MedicationSchedule,
    MedicationCompliance,
    Reminder,
    General,
}

impl RequestedDataType {
    /// Parse from the classification payload's wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "health_notes" => Some(Self::HealthNotes),
            "medication_info" => Some(Self::MedicationInfo),
            "medication_schedule" => Some(Self::MedicationSchedule),
            "medication_compliance" => Some(Self::MedicationCompliance),
            "reminder" => Some(Self::Reminder),
            "general" => Some(Self::General),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HealthNotes => "health_notes",
            Self::MedicationInfo => "medication_info",
            Self::MedicationSchedule => "medication_schedule",
            Self::MedicationCompliance => "medication_compliance",
            Self::Reminder => "reminder",
            Self::General => "general",
        }
    }

    fn base_risk(self) -> RiskLevel {
        match self {
            Self::HealthNotes | Self::MedicationCompliance => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    fn needs_consent(self) -> bool {
        matches!(self, Self::HealthNotes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// One data-access request, built by the handler from resolved state.
#[derive(Debug, Clone)]
pub struct DataAccessRequest {
    /// The patient whose data would be disclosed.
    pub patient_id: Uuid,
    /// The resolved identity the inbound message came from.
    pub requester_id: Uuid,
    pub requester_verified: bool,
    pub data_type: RequestedDataType,
    /// Whether this patient has a recorded disclosure consent.
    pub consent_on_file: bool,
}

/// Ephemeral decision. Never persisted, never reused across requests.
#[derive(Debug, Clone)]
pub struct DataAccessDecision {
    pub is_authorized: bool,
    pub risk_level: RiskLevel,
    pub requires_consent: bool,
    pub requires_escalation: bool,
    pub violations: Vec<String>,
    /// Patient-facing denial text; None when authorized.
    pub denial_message: Option<String>,
}

impl DataAccessDecision {
    fn authorize(risk_level: RiskLevel) -> Self {
        Self {
            is_authorized: true,
            risk_level,
            requires_consent: false,
            requires_escalation: false,
            violations: Vec::new(),
            denial_message: None,
        }
    }

    fn deny(
        risk_level: RiskLevel,
        requires_consent: bool,
        requires_escalation: bool,
        violations: Vec<String>,
        message: &str,
    ) -> Self {
        Self {
            is_authorized: false,
            risk_level,
            requires_consent,
            requires_escalation,
            violations,
            denial_message: Some(message.to_string()),
        }
    }
}

// Patient-facing denial texts. Generic by design: a denial must not hint at
// what data exists.
const MSG_CANNOT_PROCESS: &str = "Maaf, permintaan Anda tidak dapat kami proses saat ini. \
     Silakan hubungi petugas kesehatan Anda.";
const MSG_CONSENT_NEEDED: &str = "Untuk membagikan informasi ini kami memerlukan persetujuan \
     Anda terlebih dahulu. Petugas kami akan menghubungi Anda.";
const MSG_RESTRICTED: &str = "Informasi ini tidak dapat dibagikan melalui pesan. \
     Silakan hubungi petugas kesehatan Anda.";

// ═══════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════

/// Per-program disclosure configuration.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Data types the program allows to be disclosed over messaging at all.
    pub disclosable: HashSet<RequestedDataType>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let disclosable = [
            RequestedDataType::HealthNotes,
            RequestedDataType::MedicationInfo,
            RequestedDataType::MedicationSchedule,
            RequestedDataType::MedicationCompliance,
            RequestedDataType::Reminder,
            RequestedDataType::General,
        ]
        .into_iter()
        .collect();
        Self { disclosable }
    }
}

pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Evaluate one request. Always a fresh computation.
    pub fn validate(&self, request: &DataAccessRequest) -> DataAccessDecision {
        // Rule 1: Cross-patient request
        if request.requester_id != request.patient_id {
            tracing::warn!(
                data_type = request.data_type.as_str(),
                "Policy: cross-patient data request denied"
            );
            return DataAccessDecision::deny(
                RiskLevel::Critical,
                false,
                true,
                vec!["cross_patient_request".into()],
                MSG_CANNOT_PROCESS,
            );
        }

        // Rule 2: Unverified requester
        if !request.requester_verified {
            return DataAccessDecision::deny(
                RiskLevel::High,
                false,
                false,
                vec!["unverified_requester".into()],
                MSG_CANNOT_PROCESS,
            );
        }

        // Rule 3: Consent. Checked ahead of the program configuration so a
        // missing consent is surfaced as such even for a disabled type.
        if request.data_type.needs_consent() && !request.consent_on_file {
            return DataAccessDecision::deny(
                request.data_type.base_risk(),
                true,
                false,
                vec!["consent_missing".into()],
                MSG_CONSENT_NEEDED,
            );
        }

        // Rule 4: Program disclosure configuration
        if !self.config.disclosable.contains(&request.data_type) {
            return DataAccessDecision::deny(
                request.data_type.base_risk(),
                false,
                false,
                vec!["data_type_not_disclosable".into()],
                MSG_RESTRICTED,
            );
        }

        // Rule 5: Authorize
        let risk_level = request.data_type.base_risk();
        tracing::info!(
            data_type = request.data_type.as_str(),
            risk_level = risk_level.as_str(),
            "Policy: data access granted"
        );
        DataAccessDecision::authorize(risk_level)
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(data_type: RequestedDataType) -> DataAccessRequest {
        let id = Uuid::new_v4();
        DataAccessRequest {
            patient_id: id,
            requester_id: id,
            requester_verified: true,
            data_type,
            consent_on_file: false,
        }
    }

    // ── Rule 1: Cross-patient ────────────────────────────

    #[test]
    fn cross_patient_request_is_critical_and_escalates() {
        let engine = PolicyEngine::default();
        let mut req = request(RequestedDataType::MedicationInfo);
        req.requester_id = Uuid::new_v4();

        let decision = engine.validate(&req);
        assert!(!decision.is_authorized);
        assert_eq!(decision.risk_level, RiskLevel::Critical);
        assert!(decision.requires_escalation);
        assert_eq!(decision.denial_message.as_deref(), Some(MSG_CANNOT_PROCESS));
    }

    // ── Rule 2: Unverified ───────────────────────────────

    #[test]
    fn unverified_requester_is_high_risk_denial() {
        let engine = PolicyEngine::default();
        let mut req = request(RequestedDataType::Reminder);
        req.requester_verified = false;

        let decision = engine.validate(&req);
        assert!(!decision.is_authorized);
        assert_eq!(decision.risk_level, RiskLevel::High);
        assert!(!decision.requires_escalation);
        assert!(decision.violations.contains(&"unverified_requester".to_string()));
    }

    // ── Rule 4: Program configuration ────────────────────

    #[test]
    fn disabled_data_type_gets_restricted_message() {
        let mut config = PolicyConfig::default();
        config.disclosable.remove(&RequestedDataType::MedicationCompliance);
        let engine = PolicyEngine::new(config);

        let decision = engine.validate(&request(RequestedDataType::MedicationCompliance));
        assert!(!decision.is_authorized);
        assert!(!decision.requires_consent);
        assert_eq!(decision.denial_message.as_deref(), Some(MSG_RESTRICTED));
    }

    // ── Rule 3: Consent ──────────────────────────────────

    #[test]
    fn health_notes_without_consent_requests_consent() {
        let engine = PolicyEngine::default();
        let decision = engine.validate(&request(RequestedDataType::HealthNotes));
        assert!(!decision.is_authorized);
        assert!(decision.requires_consent);
        assert_eq!(decision.denial_message.as_deref(), Some(MSG_CONSENT_NEEDED));
    }

    #[test]
    fn health_notes_with_consent_authorized() {
        let engine = PolicyEngine::default();
        let mut req = request(RequestedDataType::HealthNotes);
        req.consent_on_file = true;

        let decision = engine.validate(&req);
        assert!(decision.is_authorized);
        assert_eq!(decision.risk_level, RiskLevel::Medium);
        assert!(decision.denial_message.is_none());
    }

    // ── Rule 5: Grants ───────────────────────────────────

    #[test]
    fn low_risk_types_authorized_for_verified_patient() {
        let engine = PolicyEngine::default();
        for data_type in [
            RequestedDataType::MedicationInfo,
            RequestedDataType::MedicationSchedule,
            RequestedDataType::Reminder,
            RequestedDataType::General,
        ] {
            let decision = engine.validate(&request(data_type));
            assert!(decision.is_authorized, "expected grant for {data_type:?}");
            assert_eq!(decision.risk_level, RiskLevel::Low);
        }
    }

    #[test]
    fn compliance_grant_is_medium_risk() {
        let engine = PolicyEngine::default();
        let decision = engine.validate(&request(RequestedDataType::MedicationCompliance));
        assert!(decision.is_authorized);
        assert_eq!(decision.risk_level, RiskLevel::Medium);
    }

    // ── Rule priority ────────────────────────────────────

    #[test]
    fn cross_patient_takes_priority_over_consent() {
        let engine = PolicyEngine::default();
        let mut req = request(RequestedDataType::HealthNotes);
        req.requester_id = Uuid::new_v4();
        req.consent_on_file = true;

        let decision = engine.validate(&req);
        assert_eq!(decision.risk_level, RiskLevel::Critical);
        assert!(!decision.requires_consent);
    }

    #[test]
    fn missing_consent_reported_before_program_restriction() {
        let mut config = PolicyConfig::default();
        config.disclosable.remove(&RequestedDataType::HealthNotes);
        let engine = PolicyEngine::new(config);

        let decision = engine.validate(&request(RequestedDataType::HealthNotes));
        assert!(!decision.is_authorized);
        assert!(decision.requires_consent);
        assert_eq!(decision.denial_message.as_deref(), Some(MSG_CONSENT_NEEDED));

        // With consent on file the program restriction is what remains.
        let mut config = PolicyConfig::default();
        config.disclosable.remove(&RequestedDataType::HealthNotes);
        let engine = PolicyEngine::new(config);
        let mut req = request(RequestedDataType::HealthNotes);
        req.consent_on_file = true;

        let decision = engine.validate(&req);
        assert!(!decision.is_authorized);
        assert!(!decision.requires_consent);
        assert_eq!(decision.denial_message.as_deref(), Some(MSG_RESTRICTED));
    }

    // ── Parsing ──────────────────────────────────────────

    #[test]
    fn data_type_round_trip() {
        for s in [
            "health_notes",
            "medication_info",
            "medication_schedule",
            "medication_compliance",
            "reminder",
            "general",
        ] {
            let parsed = RequestedDataType::parse(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert_eq!(RequestedDataType::parse("diagnosis"), None);
    }
}
