//! Patient context aggregation.
//!
//! A context snapshot is everything a handler needs to answer one message:
//! profile, reminder state, recent staff notes, active variables and the
//! tail of the conversation, plus mention terms derived from what the
//! patient wrote recently. Snapshots are cached per canonical phone with a
//! fixed TTL; mutating components invalidate before their mutation counts
//! as complete.

pub mod mentions;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::cache::ContextCache;
use crate::config::{
    CONTEXT_CACHE_TTL_SECS, MAX_ACTIVE_VARIABLES, MAX_RECENT_MESSAGES, MAX_RECENT_NOTES,
    MAX_RECENT_THREADS,
};
use crate::models::{
    HealthNote, Message, MessageDirection, PatientIdentity, PatientProfile, PatientVariable,
    ReminderRecord,
};
use crate::resolver::canonical_phone;
use crate::store::{ConversationStore, PatientStore, ReminderStore};

// ═══════════════════════════════════════════════════════════
// Snapshot
// ═══════════════════════════════════════════════════════════

/// One patient's aggregated state at a point in time.
///
/// A derived read-model: always rebuildable from the stores, never the
/// source of truth for anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientContext {
    pub profile: PatientProfile,
    /// Reminders scheduled inside today's local calendar day.
    pub todays_reminders: Vec<ReminderRecord>,
    pub active_reminders: Vec<ReminderRecord>,
    pub recent_notes: Vec<HealthNote>,
    pub active_variables: Vec<PatientVariable>,
    /// Newest first, across the most recent threads.
    pub recent_messages: Vec<Message>,
    /// Symptom terms mentioned in recent inbound messages.
    pub symptom_mentions: Vec<String>,
    /// Medication terms mentioned in recent inbound messages.
    pub medication_mentions: Vec<String>,
    pub built_at: NaiveDateTime,
}

/// Result of a context lookup.
#[derive(Debug)]
pub struct ContextOutcome {
    pub found: bool,
    pub context: Option<PatientContext>,
    pub cache_hit: bool,
}

// ═══════════════════════════════════════════════════════════
// Aggregator
// ═══════════════════════════════════════════════════════════

pub struct ContextAggregator {
    patients: Arc<dyn PatientStore>,
    reminders: Arc<dyn ReminderStore>,
    conversations: Arc<dyn ConversationStore>,
    cache: Arc<dyn ContextCache>,
    ttl: Duration,
}

impl ContextAggregator {
    pub fn new(
        patients: Arc<dyn PatientStore>,
        reminders: Arc<dyn ReminderStore>,
        conversations: Arc<dyn ConversationStore>,
        cache: Arc<dyn ContextCache>,
    ) -> Self {
        Self {
            patients,
            reminders,
            conversations,
            cache,
            ttl: Duration::from_secs(CONTEXT_CACHE_TTL_SECS),
        }
    }

    /// Build or fetch the snapshot for a resolved identity.
    ///
    /// Cache hits are returned unchanged. On a miss the sub-queries run
    /// concurrently; a failing sub-query degrades to its empty default so
    /// one slow or broken store never blanks the whole snapshot. Concurrent
    /// misses for the same patient are allowed to race and each writes its
    /// own result; last write wins.
    pub async fn get_context(&self, identity: &PatientIdentity) -> ContextOutcome {
        let key = canonical_phone(&identity.phone);

        if let Some(context) = self.cache.get(&key).await {
            tracing::debug!("Context: cache hit");
            return ContextOutcome {
                found: true,
                context: Some(context),
                cache_hit: true,
            };
        }

        let context = self.build_snapshot(identity).await;
        self.cache.set(&key, context.clone(), self.ttl).await;

        ContextOutcome {
            found: true,
            context: Some(context),
            cache_hit: false,
        }
    }

    /// Drop the cached snapshot for an identity. Mutating components call
    /// this before reporting their mutation complete.
    pub async fn invalidate(&self, identity: &PatientIdentity) {
        self.cache.invalidate(&canonical_phone(&identity.phone)).await;
    }

    async fn build_snapshot(&self, identity: &PatientIdentity) -> PatientContext {
        let patient_id = identity.id;
        let now = Local::now().naive_local();
        let day_start = now.date().and_hms_opt(0, 0, 0).unwrap_or(now);
        let day_end = day_start + chrono::Duration::days(1);

        let messages_query = async {
            let threads = self
                .conversations
                .recent_threads(patient_id, MAX_RECENT_THREADS)
                .await?;
            let thread_ids: Vec<_> = threads.iter().map(|t| t.id).collect();
            self.conversations
                .recent_messages(&thread_ids, MAX_RECENT_MESSAGES)
                .await
        };

        let (profile, todays, active, notes, variables, messages) = tokio::join!(
            self.patients.profile(patient_id),
            self.reminders.reminders_between(patient_id, day_start, day_end),
            self.reminders.active_reminders(patient_id),
            self.patients.recent_notes(patient_id, MAX_RECENT_NOTES),
            self.patients.active_variables(patient_id, MAX_ACTIVE_VARIABLES),
            messages_query,
        );

        let profile = match profile {
            Ok(Some(profile)) => profile,
            Ok(None) => fallback_profile(identity),
            Err(e) => {
                tracing::warn!(error = %e, "Context: profile sub-query failed");
                fallback_profile(identity)
            }
        };
        let todays_reminders = degrade(todays, "todays reminders");
        let active_reminders = degrade(active, "active reminders");
        let recent_notes = degrade(notes, "recent notes");
        let active_variables = degrade(variables, "active variables");
        let recent_messages = degrade(messages, "recent messages");

        let inbound: Vec<&str> = recent_messages
            .iter()
            .filter(|m| m.direction == MessageDirection::Inbound)
            .map(|m| m.body.as_str())
            .collect();
        let symptom_mentions = mentions::symptom_mentions(&inbound);
        let medication_mentions = mentions::medication_mentions(&inbound);

        PatientContext {
            profile,
            todays_reminders,
            active_reminders,
            recent_notes,
            active_variables,
            recent_messages,
            symptom_mentions,
            medication_mentions,
            built_at: now,
        }
    }
}

/// Minimal profile derived from the identity when the profile row is
/// missing or unreadable.
fn fallback_profile(identity: &PatientIdentity) -> PatientProfile {
    PatientProfile {
        patient_id: identity.id,
        name: identity.name.clone(),
        phone: identity.phone.clone(),
        preferred_language: "id".to_string(),
        enrolled_program: None,
    }
}

fn degrade<T>(result: Result<Vec<T>, crate::store::StoreError>, what: &str) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = %e, sub_query = what, "Context: sub-query degraded to empty");
            Vec::new()
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Test support
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
pub mod test_support {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;

    /// A snapshot with a fresh patient id and no content.
    pub fn empty_context() -> PatientContext {
        let patient_id = Uuid::new_v4();
        PatientContext {
            profile: PatientProfile {
                patient_id,
                name: "Ibu Sari".into(),
                phone: "+628123456789".into(),
                preferred_language: "id".into(),
                enrolled_program: None,
            },
            todays_reminders: Vec::new(),
            active_reminders: Vec::new(),
            recent_notes: Vec::new(),
            active_variables: Vec::new(),
            recent_messages: Vec::new(),
            symptom_mentions: Vec::new(),
            medication_mentions: Vec::new(),
            built_at: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }
}
