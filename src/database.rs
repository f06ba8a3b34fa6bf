//! SQLite persistence for archival messages and reminder rows
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! The reminder `text` column holds an opaque payload; packing and
//! unpacking live in `features::reminders::store`, never here.

use anyhow::{Context, Result};
use log::info;
use sqlite::{Connection, State};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One row from the `reminders` table, payload still packed
#[derive(Debug, Clone)]
pub struct ReminderRow {
    pub id: i64,
    pub text: String,
    pub due_date: String,
    pub notified: bool,
}

/// One row from the `messages` archive
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub sender: String,
    pub text: String,
    pub timestamp_ms: i64,
    pub kind: String,
}

/// Shared database handle
///
/// Cloning is cheap; all clones share one connection guarded by an async
/// mutex. The lock is never held across an await point.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and ensure the schema
    pub async fn new(path: &str) -> Result<Self> {
        if let Some(dir) = Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create database directory {dir:?}"))?;
            }
        }

        let conn = sqlite::open(path).with_context(|| format!("Failed to open database {path}"))?;
        let database = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        database.init_schema().await?;
        info!("Database ready at {path}");
        Ok(database)
    }

    /// In-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        let conn = sqlite::open(":memory:").context("Failed to open in-memory database")?;
        let database = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        database.init_schema().await?;
        Ok(database)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender TEXT,
                text TEXT,
                timestamp INTEGER,
                type TEXT
            )",
        )
        .context("Failed to create messages table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT,
                due_date TEXT,
                notified INTEGER DEFAULT 0
            )",
        )
        .context("Failed to create reminders table")?;

        Ok(())
    }

    /// Archive an inbound message, returning its row id
    pub async fn save_message(
        &self,
        sender: &str,
        text: &str,
        timestamp_ms: i64,
        kind: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        let mut statement = conn
            .prepare("INSERT INTO messages (sender, text, timestamp, type) VALUES (?, ?, ?, ?)")?;
        statement.bind((1, sender))?;
        statement.bind((2, text))?;
        statement.bind((3, timestamp_ms))?;
        statement.bind((4, kind))?;
        statement.next()?;
        last_insert_id(&conn)
    }

    /// Correct an archived message's text (post-transcription fixup)
    pub async fn update_message_text(&self, id: i64, text: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let mut statement = conn.prepare("UPDATE messages SET text = ? WHERE id = ?")?;
        statement.bind((1, text))?;
        statement.bind((2, id))?;
        statement.next()?;
        Ok(())
    }

    /// Most recently archived messages, newest first
    pub async fn recent_messages(&self, limit: i64) -> Result<Vec<MessageRow>> {
        let conn = self.conn.lock().await;
        let mut statement =
            conn.prepare("SELECT id, sender, text, timestamp, type FROM messages ORDER BY timestamp DESC LIMIT ?")?;
        statement.bind((1, limit))?;

        let mut rows = Vec::new();
        while let State::Row = statement.next()? {
            rows.push(MessageRow {
                id: statement.read::<i64, _>(0)?,
                sender: statement.read::<String, _>(1)?,
                text: statement.read::<String, _>(2)?,
                timestamp_ms: statement.read::<i64, _>(3)?,
                kind: statement.read::<String, _>(4)?,
            });
        }
        Ok(rows)
    }

    /// Insert a reminder row with `notified = 0`, returning its id
    pub async fn save_reminder(&self, payload: &str, due_date: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        let mut statement =
            conn.prepare("INSERT INTO reminders (text, due_date, notified) VALUES (?, ?, 0)")?;
        statement.bind((1, payload))?;
        statement.bind((2, due_date))?;
        statement.next()?;
        last_insert_id(&conn)
    }

    /// All unnotified reminders, earliest due first (ties by id)
    pub async fn open_reminders(&self) -> Result<Vec<ReminderRow>> {
        let conn = self.conn.lock().await;
        let mut statement = conn.prepare(
            "SELECT id, text, due_date, notified FROM reminders
             WHERE notified = 0
             ORDER BY datetime(due_date) ASC, id ASC",
        )?;
        read_reminder_rows(&mut statement)
    }

    /// Unnotified reminders due at or before `reference` (ISO 8601)
    pub async fn due_reminders(&self, reference: &str) -> Result<Vec<ReminderRow>> {
        let conn = self.conn.lock().await;
        let mut statement = conn.prepare(
            "SELECT id, text, due_date, notified FROM reminders
             WHERE notified = 0 AND datetime(due_date) <= datetime(?)
             ORDER BY datetime(due_date) ASC, id ASC",
        )?;
        statement.bind((1, reference))?;
        read_reminder_rows(&mut statement)
    }

    /// Flip the notified flag; a second call on the same row is a no-op
    pub async fn mark_reminder_notified(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        let mut statement = conn.prepare("UPDATE reminders SET notified = 1 WHERE id = ?")?;
        statement.bind((1, id))?;
        statement.next()?;
        Ok(())
    }

    /// Administrative wipe of reminders and archived messages
    pub async fn clear_all(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM reminders")?;
        conn.execute("DELETE FROM messages")?;
        info!("Cleared all reminders and archived messages");
        Ok(())
    }
}

fn last_insert_id(conn: &Connection) -> Result<i64> {
    let mut statement = conn.prepare("SELECT last_insert_rowid()")?;
    statement.next()?;
    Ok(statement.read::<i64, _>(0)?)
}

fn read_reminder_rows(statement: &mut sqlite::Statement<'_>) -> Result<Vec<ReminderRow>> {
    let mut rows = Vec::new();
    while let State::Row = statement.next()? {
        rows.push(ReminderRow {
            id: statement.read::<i64, _>(0)?,
            text: statement.read::<String, _>(1)?,
            due_date: statement.read::<String, _>(2)?,
            notified: statement.read::<i64, _>(3)? != 0,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_message_archive_roundtrip() {
        let db = Database::in_memory().await.unwrap();

        let id = db
            .save_message("group@g.us", "hello", 1_714_550_400_000, "text")
            .await
            .unwrap();
        assert!(id > 0);

        let rows = db.recent_messages(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender, "group@g.us");
        assert_eq!(rows[0].text, "hello");
        assert_eq!(rows[0].kind, "text");
    }

    #[tokio::test]
    async fn test_update_message_text() {
        let db = Database::in_memory().await.unwrap();
        let id = db
            .save_message("group@g.us", "[Sprachnachricht]", 0, "audio")
            .await
            .unwrap();

        db.update_message_text(id, "transcribed words").await.unwrap();

        let rows = db.recent_messages(10).await.unwrap();
        assert_eq!(rows[0].text, "transcribed words");
        assert_eq!(rows[0].kind, "audio");
    }

    #[tokio::test]
    async fn test_open_reminders_ordering_with_ties() {
        let db = Database::in_memory().await.unwrap();

        db.save_reminder("c", "2024-05-03T10:00:00Z").await.unwrap();
        db.save_reminder("a", "2024-05-01T10:00:00Z").await.unwrap();
        db.save_reminder("b", "2024-05-01T10:00:00Z").await.unwrap();

        let rows = db.open_reminders().await.unwrap();
        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        // Earliest due first, insertion order breaks the tie
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_due_reminders_cutoff() {
        let db = Database::in_memory().await.unwrap();

        db.save_reminder("past", "2024-05-01T10:00:00Z").await.unwrap();
        db.save_reminder("exact", "2024-05-02T00:00:00Z").await.unwrap();
        db.save_reminder("future", "2024-06-01T10:00:00Z").await.unwrap();

        let due = db.due_reminders("2024-05-02T00:00:00Z").await.unwrap();
        let texts: Vec<&str> = due.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["past", "exact"]);
    }

    #[tokio::test]
    async fn test_mark_notified_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let id = db.save_reminder("x", "2024-05-01T10:00:00Z").await.unwrap();

        db.mark_reminder_notified(id).await.unwrap();
        db.mark_reminder_notified(id).await.unwrap();

        assert!(db.open_reminders().await.unwrap().is_empty());
        assert!(db
            .due_reminders("2030-01-01T00:00:00Z")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let db = Database::in_memory().await.unwrap();
        db.save_message("group@g.us", "hi", 0, "text").await.unwrap();
        db.save_reminder("x", "2024-05-01T10:00:00Z").await.unwrap();

        db.clear_all().await.unwrap();

        assert!(db.open_reminders().await.unwrap().is_empty());
        assert!(db.recent_messages(10).await.unwrap().is_empty());
    }
}
