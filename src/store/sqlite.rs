//! Bundled SQLite implementation of the store traits.
//!
//! Schema note: UUIDs are stored as text, timestamps as
//! `%Y-%m-%d %H:%M:%S` text. Soft deletes only: `deleted_at` is set,
//! rows are never removed.

use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{
    ConversationStore, NotificationStore, PatientStore, ReminderStore, StoreError,
};
use crate::models::*;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    verification_status TEXT NOT NULL,
    verification_responded_at TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_patients_phone ON patients(phone);

CREATE TABLE IF NOT EXISTS patient_profiles (
    patient_id TEXT PRIMARY KEY REFERENCES patients(id),
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    preferred_language TEXT NOT NULL DEFAULT 'id',
    enrolled_program TEXT
);

CREATE TABLE IF NOT EXISTS patient_variables (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS health_notes (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    note_type TEXT,
    content TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reminders (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    title TEXT NOT NULL,
    recurrence TEXT NOT NULL,
    scheduled_for TEXT NOT NULL,
    ends_on TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    confirmation_status TEXT,
    confirmed_at TEXT,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_reminders_patient ON reminders(patient_id);

CREATE TABLE IF NOT EXISTS manual_confirmations (
    id TEXT PRIMARY KEY,
    reminder_id TEXT NOT NULL REFERENCES reminders(id),
    confirmed_by TEXT NOT NULL,
    note TEXT,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversation_threads (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    started_at TEXT NOT NULL,
    last_message_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    thread_id TEXT NOT NULL REFERENCES conversation_threads(id),
    direction TEXT NOT NULL,
    body TEXT NOT NULL,
    detected_intent TEXT,
    intent_confidence REAL,
    sent_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id);

CREATE TABLE IF NOT EXISTS escalation_notifications (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    reason TEXT NOT NULL,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    message TEXT NOT NULL,
    assigned_to TEXT,
    response TEXT,
    created_at TEXT NOT NULL,
    responded_at TEXT
);
";

const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DT_FORMAT).unwrap_or_default()
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::ConstraintViolation(e.to_string()))
}

/// SQLite-backed store. A single connection behind a mutex; no query here
/// holds the lock across an await point.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, used throughout the test suite.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::SchemaFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ── Writes used by onboarding/transport tooling and tests ────────────

    pub fn insert_patient(&self, patient: &PatientIdentity) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO patients
             (id, name, phone, verification_status, verification_responded_at,
              is_active, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                patient.id.to_string(),
                patient.name,
                patient.phone,
                patient.verification_status.as_str(),
                patient.verification_responded_at.as_ref().map(fmt_dt),
                patient.is_active,
                fmt_dt(&patient.created_at),
                patient.deleted_at.as_ref().map(fmt_dt),
            ],
        )?;
        Ok(())
    }

    pub fn insert_profile(&self, profile: &PatientProfile) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO patient_profiles
             (patient_id, name, phone, preferred_language, enrolled_program)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.patient_id.to_string(),
                profile.name,
                profile.phone,
                profile.preferred_language,
                profile.enrolled_program,
            ],
        )?;
        Ok(())
    }

    pub fn insert_variable(&self, variable: &PatientVariable) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO patient_variables (id, patient_id, name, value, is_active, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                variable.id.to_string(),
                variable.patient_id.to_string(),
                variable.name,
                variable.value,
                variable.is_active,
                fmt_dt(&variable.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn insert_note(&self, note: &HealthNote) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO health_notes (id, patient_id, note_type, content, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                note.id.to_string(),
                note.patient_id.to_string(),
                note.note_type,
                note.content,
                fmt_dt(&note.recorded_at),
            ],
        )?;
        Ok(())
    }

    pub fn insert_reminder(&self, reminder: &ReminderRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO reminders
             (id, patient_id, title, recurrence, scheduled_for, ends_on, is_active,
              confirmation_status, confirmed_at, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                reminder.id.to_string(),
                reminder.patient_id.to_string(),
                reminder.title,
                reminder.recurrence,
                fmt_dt(&reminder.scheduled_for),
                reminder.ends_on.map(|d| d.to_string()),
                reminder.is_active,
                reminder.confirmation_status.as_ref().map(|s| s.as_str()),
                reminder.confirmed_at.as_ref().map(fmt_dt),
                fmt_dt(&reminder.created_at),
                reminder.deleted_at.as_ref().map(fmt_dt),
            ],
        )?;
        Ok(())
    }

    pub fn insert_manual_confirmation(
        &self,
        confirmation: &ManualConfirmation,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO manual_confirmations (id, reminder_id, confirmed_by, note, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                confirmation.id.to_string(),
                confirmation.reminder_id.to_string(),
                confirmation.confirmed_by,
                confirmation.note,
                fmt_dt(&confirmation.recorded_at),
            ],
        )?;
        Ok(())
    }

    pub fn insert_thread(&self, thread: &ConversationThread) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO conversation_threads (id, patient_id, started_at, last_message_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                thread.id.to_string(),
                thread.patient_id.to_string(),
                fmt_dt(&thread.started_at),
                fmt_dt(&thread.last_message_at),
            ],
        )?;
        Ok(())
    }

    pub fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages
             (id, thread_id, direction, body, detected_intent, intent_confidence, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.to_string(),
                message.thread_id.to_string(),
                message.direction.as_str(),
                message.body,
                message.detected_intent,
                message.intent_confidence,
                fmt_dt(&message.sent_at),
            ],
        )?;
        Ok(())
    }
}

// ── Row mapping ──────────────────────────────────────────────────────────

struct PatientRow {
    id: String,
    name: String,
    phone: String,
    verification_status: String,
    verification_responded_at: Option<String>,
    is_active: bool,
    created_at: String,
    deleted_at: Option<String>,
}

fn patient_from_row(row: PatientRow) -> Result<PatientIdentity, StoreError> {
    Ok(PatientIdentity {
        id: parse_uuid(&row.id)?,
        name: row.name,
        phone: row.phone,
        verification_status: VerificationStatus::from_str(&row.verification_status)?,
        verification_responded_at: row.verification_responded_at.as_deref().map(parse_dt),
        is_active: row.is_active,
        created_at: parse_dt(&row.created_at),
        deleted_at: row.deleted_at.as_deref().map(parse_dt),
    })
}

struct ReminderRow {
    id: String,
    patient_id: String,
    title: String,
    recurrence: String,
    scheduled_for: String,
    ends_on: Option<String>,
    is_active: bool,
    confirmation_status: Option<String>,
    confirmed_at: Option<String>,
    created_at: String,
    deleted_at: Option<String>,
}

fn reminder_from_row(row: ReminderRow) -> Result<ReminderRecord, StoreError> {
    Ok(ReminderRecord {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        title: row.title,
        recurrence: row.recurrence,
        scheduled_for: parse_dt(&row.scheduled_for),
        ends_on: row
            .ends_on
            .as_deref()
            .and_then(|s| s.parse().ok()),
        is_active: row.is_active,
        confirmation_status: row
            .confirmation_status
            .as_deref()
            .map(ConfirmationStatus::from_str)
            .transpose()?,
        confirmed_at: row.confirmed_at.as_deref().map(parse_dt),
        created_at: parse_dt(&row.created_at),
        deleted_at: row.deleted_at.as_deref().map(parse_dt),
    })
}

const PATIENT_COLUMNS: &str = "id, name, phone, verification_status, \
     verification_responded_at, is_active, created_at, deleted_at";

const REMINDER_COLUMNS: &str = "id, patient_id, title, recurrence, scheduled_for, \
     ends_on, is_active, confirmation_status, confirmed_at, created_at, deleted_at";

fn map_patient_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        verification_status: row.get(3)?,
        verification_responded_at: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        deleted_at: row.get(7)?,
    })
}

fn map_reminder_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReminderRow> {
    Ok(ReminderRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        title: row.get(2)?,
        recurrence: row.get(3)?,
        scheduled_for: row.get(4)?,
        ends_on: row.get(5)?,
        is_active: row.get(6)?,
        confirmation_status: row.get(7)?,
        confirmed_at: row.get(8)?,
        created_at: row.get(9)?,
        deleted_at: row.get(10)?,
    })
}

// ── Trait implementations ────────────────────────────────────────────────

#[async_trait]
impl PatientStore for SqliteStore {
    async fn find_active_by_phone(
        &self,
        phone: &str,
    ) -> Result<Vec<PatientIdentity>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients
             WHERE phone = ?1 AND is_active = 1 AND deleted_at IS NULL"
        ))?;
        let rows = stmt.query_map(params![phone], map_patient_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(patient_from_row(row?)?);
        }
        Ok(patients)
    }

    async fn patient(&self, id: Uuid) -> Result<Option<PatientIdentity>, StoreError> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            map_patient_row,
        );
        match result {
            Ok(row) => Ok(Some(patient_from_row(row)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn profile(&self, id: Uuid) -> Result<Option<PatientProfile>, StoreError> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT patient_id, name, phone, preferred_language, enrolled_program
             FROM patient_profiles WHERE patient_id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        );
        match result {
            Ok((patient_id, name, phone, preferred_language, enrolled_program)) => {
                Ok(Some(PatientProfile {
                    patient_id: parse_uuid(&patient_id)?,
                    name,
                    phone,
                    preferred_language,
                    enrolled_program,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
        responded_at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE patients SET verification_status = ?1, verification_responded_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
            params![status.as_str(), fmt_dt(&responded_at), id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity_type: "patient".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn active_variables(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<PatientVariable>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, name, value, is_active, updated_at
             FROM patient_variables
             WHERE patient_id = ?1 AND is_active = 1
             ORDER BY updated_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![patient_id.to_string(), limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut variables = Vec::new();
        for row in rows {
            let (id, pid, name, value, is_active, updated_at) = row?;
            variables.push(PatientVariable {
                id: parse_uuid(&id)?,
                patient_id: parse_uuid(&pid)?,
                name,
                value,
                is_active,
                updated_at: parse_dt(&updated_at),
            });
        }
        Ok(variables)
    }

    async fn recent_notes(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<HealthNote>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, note_type, content, recorded_at
             FROM health_notes WHERE patient_id = ?1
             ORDER BY recorded_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![patient_id.to_string(), limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut notes = Vec::new();
        for row in rows {
            let (id, pid, note_type, content, recorded_at) = row?;
            notes.push(HealthNote {
                id: parse_uuid(&id)?,
                patient_id: parse_uuid(&pid)?,
                note_type,
                content,
                recorded_at: parse_dt(&recorded_at),
            });
        }
        Ok(notes)
    }
}

#[async_trait]
impl ReminderStore for SqliteStore {
    async fn active_reminders(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<ReminderRecord>, StoreError> {
        let today = Local::now().date_naive();
        let reminders = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {REMINDER_COLUMNS} FROM reminders
                 WHERE patient_id = ?1 AND is_active = 1 AND deleted_at IS NULL
                 ORDER BY scheduled_for ASC"
            ))?;
            let rows = stmt.query_map(params![patient_id.to_string()], map_reminder_row)?;

            let mut reminders = Vec::new();
            for row in rows {
                reminders.push(reminder_from_row(row?)?);
            }
            reminders
        };

        Ok(reminders
            .into_iter()
            .filter(|r| r.ends_on.map_or(true, |end| end >= today))
            .collect())
    }

    async fn reminders_between(
        &self,
        patient_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<ReminderRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE patient_id = ?1 AND is_active = 1 AND deleted_at IS NULL
               AND scheduled_for >= ?2 AND scheduled_for < ?3
             ORDER BY scheduled_for ASC"
        ))?;
        let rows = stmt.query_map(
            params![patient_id.to_string(), fmt_dt(&from), fmt_dt(&to)],
            map_reminder_row,
        )?;

        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(reminder_from_row(row?)?);
        }
        Ok(reminders)
    }

    async fn awaiting_confirmation(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<ReminderRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE patient_id = ?1 AND is_active = 1 AND deleted_at IS NULL
               AND confirmation_status = 'pending'
             ORDER BY scheduled_for ASC"
        ))?;
        let rows = stmt.query_map(params![patient_id.to_string()], map_reminder_row)?;

        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(reminder_from_row(row?)?);
        }
        Ok(reminders)
    }

    async fn update_confirmation(
        &self,
        reminder_id: Uuid,
        status: ConfirmationStatus,
        at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE reminders SET confirmation_status = ?1, confirmed_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
            params![status.as_str(), fmt_dt(&at), reminder_id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity_type: "reminder".into(),
                id: reminder_id.to_string(),
            });
        }
        Ok(())
    }

    async fn manual_confirmations(
        &self,
        reminder_ids: &[Uuid],
    ) -> Result<Vec<ManualConfirmation>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, reminder_id, confirmed_by, note, recorded_at
             FROM manual_confirmations WHERE reminder_id = ?1",
        )?;

        let mut confirmations = Vec::new();
        for reminder_id in reminder_ids {
            let rows = stmt.query_map(params![reminder_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?;
            for row in rows {
                let (id, rid, confirmed_by, note, recorded_at) = row?;
                confirmations.push(ManualConfirmation {
                    id: parse_uuid(&id)?,
                    reminder_id: parse_uuid(&rid)?,
                    confirmed_by,
                    note,
                    recorded_at: parse_dt(&recorded_at),
                });
            }
        }
        Ok(confirmations)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn recent_threads(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ConversationThread>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, started_at, last_message_at
             FROM conversation_threads WHERE patient_id = ?1
             ORDER BY last_message_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![patient_id.to_string(), limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut threads = Vec::new();
        for row in rows {
            let (id, pid, started_at, last_message_at) = row?;
            threads.push(ConversationThread {
                id: parse_uuid(&id)?,
                patient_id: parse_uuid(&pid)?,
                started_at: parse_dt(&started_at),
                last_message_at: parse_dt(&last_message_at),
            });
        }
        Ok(threads)
    }

    async fn recent_messages(
        &self,
        thread_ids: &[Uuid],
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, direction, body, detected_intent, intent_confidence, sent_at
             FROM messages WHERE thread_id = ?1
             ORDER BY sent_at DESC LIMIT ?2",
        )?;

        let mut messages = Vec::new();
        for thread_id in thread_ids {
            let rows = stmt.query_map(params![thread_id.to_string(), limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<f32>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?;
            for row in rows {
                let (id, tid, direction, body, detected_intent, intent_confidence, sent_at) =
                    row?;
                messages.push(Message {
                    id: parse_uuid(&id)?,
                    thread_id: parse_uuid(&tid)?,
                    direction: MessageDirection::from_str(&direction)?,
                    body,
                    detected_intent,
                    intent_confidence,
                    sent_at: parse_dt(&sent_at),
                });
            }
        }

        // Newest first across all threads, then clip to the window.
        messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        messages.truncate(limit);
        Ok(messages)
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert_notification(
        &self,
        notification: &EscalationNotification,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO escalation_notifications
             (id, patient_id, reason, priority, status, message, assigned_to,
              response, created_at, responded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                notification.id.to_string(),
                notification.patient_id.to_string(),
                notification.reason.as_str(),
                notification.priority.as_str(),
                notification.status.as_str(),
                notification.message,
                notification.assigned_to,
                notification.response,
                fmt_dt(&notification.created_at),
                notification.responded_at.as_ref().map(fmt_dt),
            ],
        )?;
        Ok(())
    }

    async fn responded_notifications(
        &self,
    ) -> Result<Vec<EscalationNotification>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, reason, priority, status, message, assigned_to,
                    response, created_at, responded_at
             FROM escalation_notifications WHERE status = 'responded'",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, Option<String>>(9)?,
            ))
        })?;

        let mut notifications = Vec::new();
        for row in rows {
            let (id, pid, reason, priority, status, message, assigned_to, response, created, responded) = row?;
            notifications.push(EscalationNotification {
                id: parse_uuid(&id)?,
                patient_id: parse_uuid(&pid)?,
                reason: EscalationReason::from_str(&reason)?,
                priority: NotificationPriority::from_str(&priority)?,
                status: NotificationStatus::from_str(&status)?,
                message,
                assigned_to,
                response,
                created_at: parse_dt(&created),
                responded_at: responded.as_deref().map(parse_dt),
            });
        }
        Ok(notifications)
    }
}
