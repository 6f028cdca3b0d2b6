//! Repository-style persistence seams.
//!
//! Every entity in the data model is read and written through one of the
//! traits below so the pipeline can run against the bundled SQLite store,
//! an in-memory store for tests, or a remote service owned by the host.

pub mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Schema initialization failed: {0}")]
    SchemaFailed(String),

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Patient identities, profiles, variables and staff notes.
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// All active, non-deleted identities stored under exactly this phone
    /// representation. Status preference is applied by the resolver, not here.
    async fn find_active_by_phone(&self, phone: &str)
        -> Result<Vec<PatientIdentity>, StoreError>;

    async fn patient(&self, id: Uuid) -> Result<Option<PatientIdentity>, StoreError>;

    async fn profile(&self, id: Uuid) -> Result<Option<PatientProfile>, StoreError>;

    async fn update_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
        responded_at: NaiveDateTime,
    ) -> Result<(), StoreError>;

    /// Active patient variables, most recently updated first.
    async fn active_variables(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<PatientVariable>, StoreError>;

    /// Staff notes, most recent first.
    async fn recent_notes(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<HealthNote>, StoreError>;
}

/// Reminder schedules, confirmations and staff-entered completions.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Active, non-deleted reminders with no end date or an end date that has
    /// not passed.
    async fn active_reminders(&self, patient_id: Uuid)
        -> Result<Vec<ReminderRecord>, StoreError>;

    /// Active reminders scheduled inside [from, to).
    async fn reminders_between(
        &self,
        patient_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<ReminderRecord>, StoreError>;

    /// Active reminders that were delivered and are still awaiting a reply.
    async fn awaiting_confirmation(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<ReminderRecord>, StoreError>;

    async fn update_confirmation(
        &self,
        reminder_id: Uuid,
        status: ConfirmationStatus,
        at: NaiveDateTime,
    ) -> Result<(), StoreError>;

    /// Staff-entered completion records for any of the given reminders.
    async fn manual_confirmations(
        &self,
        reminder_ids: &[Uuid],
    ) -> Result<Vec<ManualConfirmation>, StoreError>;
}

/// Conversation history. Read-only for the engine; the transport layer writes.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Most recently active threads first.
    async fn recent_threads(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ConversationThread>, StoreError>;

    /// Most recent messages across the given threads, newest first.
    async fn recent_messages(
        &self,
        thread_ids: &[Uuid],
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;
}

/// Escalation notifications created by the fanout.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(
        &self,
        notification: &EscalationNotification,
    ) -> Result<(), StoreError>;

    /// All notifications a staff member has responded to.
    async fn responded_notifications(&self)
        -> Result<Vec<EscalationNotification>, StoreError>;
}
