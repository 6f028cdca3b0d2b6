//! Phone/identity resolution.
//!
//! Inbound transports hand us whatever the patient's device sent:
//! `+628xxx`, `628xxx`, `08xxx`, sometimes with spaces or dashes. A patient
//! is stored under exactly one representation, so resolution tries the
//! exact form first and then a bounded set of generated alternates.

use std::sync::Arc;

use crate::config::DEFAULT_COUNTRY_CODE;
use crate::models::{PatientIdentity, VerificationStatus};
use crate::store::PatientStore;

/// Outcome of a resolution attempt. Read-only; never errors to the caller,
/// a failing store is reported through `store_failed`.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub found: bool,
    pub patient: Option<PatientIdentity>,
    /// Every format tried after the exact form, for diagnostics.
    pub attempted_formats: Vec<String>,
    pub store_failed: bool,
}

impl ResolveOutcome {
    fn miss(attempted_formats: Vec<String>, store_failed: bool) -> Self {
        Self {
            found: false,
            patient: None,
            attempted_formats,
            store_failed,
        }
    }

    fn hit(patient: PatientIdentity) -> Self {
        Self {
            found: true,
            patient: Some(patient),
            attempted_formats: Vec::new(),
            store_failed: false,
        }
    }
}

/// Strip formatting characters, keeping digits and a leading '+'.
pub fn clean_phone(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for (i, c) in raw.trim().chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            cleaned.push(c);
        }
    }
    cleaned
}

/// Canonical representation: `+<country_code><subscriber>`.
///
/// Used as the context-cache key, so every representation of one number
/// must canonicalize identically.
pub fn canonical_phone(raw: &str) -> String {
    let cleaned = clean_phone(raw);
    if let Some(rest) = cleaned.strip_prefix('+') {
        return format!("+{rest}");
    }
    if let Some(rest) = cleaned.strip_prefix(DEFAULT_COUNTRY_CODE) {
        return format!("+{DEFAULT_COUNTRY_CODE}{rest}");
    }
    if let Some(rest) = cleaned.strip_prefix('0') {
        return format!("+{DEFAULT_COUNTRY_CODE}{rest}");
    }
    format!("+{DEFAULT_COUNTRY_CODE}{cleaned}")
}

/// Generate the bounded set of alternate representations for a number,
/// excluding the cleaned input itself.
pub fn alternate_formats(raw: &str) -> Vec<String> {
    let cleaned = clean_phone(raw);
    let canonical = canonical_phone(raw);
    let subscriber = canonical
        .strip_prefix('+')
        .and_then(|s| s.strip_prefix(DEFAULT_COUNTRY_CODE))
        .unwrap_or(&canonical)
        .to_string();

    let candidates = [
        canonical.clone(),
        format!("{DEFAULT_COUNTRY_CODE}{subscriber}"),
        format!("0{subscriber}"),
        subscriber,
    ];

    let mut alternates = Vec::new();
    for candidate in candidates {
        if candidate != cleaned && !alternates.contains(&candidate) {
            alternates.push(candidate);
        }
    }
    alternates
}

/// Prefer a pending-verification match over a verified match over any other.
fn pick_preferred(matches: Vec<PatientIdentity>) -> Option<PatientIdentity> {
    let preference = [VerificationStatus::Pending, VerificationStatus::Verified];
    for status in preference {
        if let Some(patient) = matches.iter().find(|p| p.verification_status == status) {
            return Some(patient.clone());
        }
    }
    matches.into_iter().next()
}

pub struct IdentityResolver {
    patients: Arc<dyn PatientStore>,
}

impl IdentityResolver {
    pub fn new(patients: Arc<dyn PatientStore>) -> Self {
        Self { patients }
    }

    /// Resolve a raw contact string to a patient.
    pub async fn resolve(&self, raw: &str) -> ResolveOutcome {
        let cleaned = clean_phone(raw);
        if cleaned.is_empty() {
            return ResolveOutcome::miss(Vec::new(), false);
        }

        // Exact match on the form as received.
        match self.patients.find_active_by_phone(&cleaned).await {
            Ok(matches) => {
                if let Some(patient) = pick_preferred(matches) {
                    return ResolveOutcome::hit(patient);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity resolution: store failure on exact match");
                return ResolveOutcome::miss(Vec::new(), true);
            }
        }

        // Country-code alternates.
        let alternates = alternate_formats(&cleaned);
        for format in &alternates {
            match self.patients.find_active_by_phone(format).await {
                Ok(matches) => {
                    if let Some(patient) = pick_preferred(matches) {
                        return ResolveOutcome::hit(patient);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Identity resolution: store failure on alternate");
                    return ResolveOutcome::miss(alternates.clone(), true);
                }
            }
        }

        tracing::debug!(
            attempted = alternates.len() + 1,
            "Identity resolution: no match"
        );
        ResolveOutcome::miss(alternates, false)
    }
}
