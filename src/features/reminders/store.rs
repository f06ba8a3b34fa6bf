//! Reminder repository over the shared database
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! Conversation id and sender name are not columns of their own: together
//! with the reminder text they are packed into the row's single payload
//! field and unpacked on read. Legacy rows whose payload predates the
//! packed format decode as plain reminder text, never as an error.

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::database::{Database, ReminderRow};

/// A fully decoded reminder
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: i64,
    pub reminder_text: String,
    /// Delivery target; absent for malformed legacy rows
    pub conversation_id: Option<String>,
    /// Requester display name, if known
    pub sender_name: Option<String>,
    pub due_at: DateTime<Utc>,
    pub notified: bool,
}

/// Packed payload layout; field names match the historical wire format
#[derive(Debug, Serialize, Deserialize)]
struct ReminderPayload {
    #[serde(rename = "reminderText", default)]
    reminder_text: String,
    #[serde(rename = "chatId", default, skip_serializing_if = "Option::is_none")]
    conversation_id: Option<String>,
    #[serde(rename = "senderName", default, skip_serializing_if = "Option::is_none")]
    sender_name: Option<String>,
}

#[derive(Clone)]
pub struct ReminderStore {
    database: Database,
}

impl ReminderStore {
    pub fn new(database: Database) -> Self {
        ReminderStore { database }
    }

    /// Persist a new reminder, returning its id
    pub async fn create(
        &self,
        reminder_text: &str,
        conversation_id: Option<&str>,
        sender_name: Option<&str>,
        due_at: DateTime<Utc>,
    ) -> Result<i64> {
        let payload = serde_json::to_string(&ReminderPayload {
            reminder_text: reminder_text.to_string(),
            conversation_id: conversation_id.map(str::to_string),
            sender_name: sender_name.map(str::to_string),
        })?;
        let due = due_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.database.save_reminder(&payload, &due).await
    }

    /// All unnotified reminders, earliest due first
    pub async fn list_pending(&self) -> Result<Vec<Reminder>> {
        let rows = self.database.open_reminders().await?;
        Ok(rows.into_iter().map(decode_row).collect())
    }

    /// Unnotified reminders due at or before `reference`
    pub async fn list_due(&self, reference: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let cutoff = reference.to_rfc3339_opts(SecondsFormat::Secs, true);
        let rows = self.database.due_reminders(&cutoff).await?;
        Ok(rows.into_iter().map(decode_row).collect())
    }

    /// Terminal delivery-attempt state; repeat calls are no-ops
    pub async fn mark_notified(&self, id: i64) -> Result<()> {
        self.database.mark_reminder_notified(id).await
    }

    /// Wipe all reminders and archived messages
    pub async fn clear_all(&self) -> Result<()> {
        self.database.clear_all().await
    }
}

fn decode_row(row: ReminderRow) -> Reminder {
    let payload = decode_payload(&row.text);
    let due_at = match DateTime::parse_from_rfc3339(&row.due_date) {
        Ok(due) => due.with_timezone(&Utc),
        Err(e) => {
            warn!(
                "Reminder {} has an unparseable due date '{}': {e}",
                row.id, row.due_date
            );
            DateTime::<Utc>::MIN_UTC
        }
    };

    Reminder {
        id: row.id,
        reminder_text: payload.reminder_text,
        conversation_id: payload.conversation_id,
        sender_name: payload.sender_name,
        due_at,
        notified: row.notified,
    }
}

/// Unpack a payload, falling back to the raw text for legacy rows
fn decode_payload(raw: &str) -> ReminderPayload {
    match serde_json::from_str::<ReminderPayload>(raw) {
        Ok(mut payload) => {
            if payload.reminder_text.is_empty() {
                payload.reminder_text = raw.to_string();
            }
            payload
        }
        Err(_) => ReminderPayload {
            reminder_text: raw.to_string(),
            conversation_id: None,
            sender_name: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn store() -> ReminderStore {
        ReminderStore::new(Database::in_memory().await.unwrap())
    }

    fn due(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_payload_roundtrip() {
        let store = store().await;
        store
            .create("buy milk", Some("g1@x"), Some("Alex"), due(2, 9))
            .await
            .unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reminder_text, "buy milk");
        assert_eq!(pending[0].conversation_id.as_deref(), Some("g1@x"));
        assert_eq!(pending[0].sender_name.as_deref(), Some("Alex"));
        assert_eq!(pending[0].due_at, due(2, 9));
        assert!(!pending[0].notified);
    }

    #[tokio::test]
    async fn test_legacy_plain_text_payload_decodes_gracefully() {
        let store = store().await;
        store
            .database
            .save_reminder("brot kaufen", "2024-05-02T09:00:00Z")
            .await
            .unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending[0].reminder_text, "brot kaufen");
        assert_eq!(pending[0].conversation_id, None);
        assert_eq!(pending[0].sender_name, None);
    }

    #[tokio::test]
    async fn test_absent_optionals_survive_roundtrip() {
        let store = store().await;
        store.create("ohne kontext", None, None, due(2, 9)).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending[0].conversation_id, None);
        assert_eq!(pending[0].sender_name, None);
    }

    #[tokio::test]
    async fn test_pending_order_is_due_ascending_with_id_ties() {
        let store = store().await;
        let late = store.create("late", None, None, due(3, 9)).await.unwrap();
        let a = store.create("a", None, None, due(2, 9)).await.unwrap();
        let b = store.create("b", None, None, due(2, 9)).await.unwrap();

        let ids: Vec<i64> = store
            .list_pending()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![a, b, late]);
    }

    #[tokio::test]
    async fn test_list_due_excludes_notified_and_future() {
        let store = store().await;
        let first = store.create("first", None, None, due(1, 9)).await.unwrap();
        store.create("second", None, None, due(2, 9)).await.unwrap();
        store.create("future", None, None, due(20, 9)).await.unwrap();

        let due_now = store.list_due(due(2, 12)).await.unwrap();
        assert_eq!(due_now.len(), 2);

        store.mark_notified(first).await.unwrap();
        store.mark_notified(first).await.unwrap();

        let due_after = store.list_due(due(2, 12)).await.unwrap();
        assert_eq!(due_after.len(), 1);
        assert_eq!(due_after[0].reminder_text, "second");
    }

    #[tokio::test]
    async fn test_malformed_due_date_degrades_to_overdue() {
        let store = store().await;
        store
            .database
            .save_reminder("kaputt", "not-a-date")
            .await
            .unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].due_at, DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn test_clear_all_empties_store() {
        let store = store().await;
        store.create("x", None, None, due(2, 9)).await.unwrap();
        store.clear_all().await.unwrap();
        assert!(store.list_pending().await.unwrap().is_empty());
    }
}
