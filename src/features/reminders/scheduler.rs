//! Periodic due-reminder dispatch
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Re-check authorization at delivery time
//! - 1.0.0: Initial dispatch loop
//!
//! Every tick queries the store for due reminders and attempts delivery
//! through the live transport. A reminder is marked notified after exactly
//! one attempt, whether it was delivered, undeliverable, or no longer
//! authorized; delivery is at-most-once and the queue can never get stuck
//! on a permanently undeliverable row.

use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::time::Duration;

use crate::features::authorization::AuthorizationGate;
use crate::features::reminders::store::ReminderStore;
use crate::transport::{ChatTransport, SharedTransport};

pub struct ReminderScheduler {
    reminders: ReminderStore,
    gate: AuthorizationGate,
    transport: SharedTransport,
    poll: Duration,
}

impl ReminderScheduler {
    pub fn new(
        reminders: ReminderStore,
        gate: AuthorizationGate,
        transport: SharedTransport,
        poll: Duration,
    ) -> Self {
        ReminderScheduler {
            reminders,
            gate,
            transport,
            poll,
        }
    }

    /// Run the dispatch loop forever; intended for `tokio::spawn`
    pub async fn run(self) {
        info!(
            "Reminder dispatcher polling every {}s",
            self.poll.as_secs()
        );
        let mut interval = tokio::time::interval(self.poll);
        loop {
            interval.tick().await;

            let Some(transport) = self.transport.get().await else {
                debug!("No live transport connection, skipping dispatch tick");
                continue;
            };

            if let Err(e) = self.tick(transport.as_ref()).await {
                error!("Dispatch tick failed: {e}");
            }
        }
    }

    /// One dispatch pass over everything currently due
    pub async fn tick(&self, transport: &dyn ChatTransport) -> Result<()> {
        let due = self.reminders.list_due(Utc::now()).await?;

        for reminder in due {
            let id = reminder.id;

            let Some(conversation_id) = reminder.conversation_id.as_deref() else {
                warn!("Cannot deliver reminder {id}, conversation id is missing");
                self.mark(id).await;
                continue;
            };

            if !self.gate.is_allowed(conversation_id, transport).await {
                warn!("Dropping reminder {id}, conversation is no longer allowed");
                self.mark(id).await;
                continue;
            }

            let text = format!("Erinnerung: {} (faellig jetzt)", reminder.reminder_text);
            match transport.send_message(conversation_id, &text).await {
                Ok(()) => info!("Delivered reminder {id} to {conversation_id}"),
                Err(e) => error!("Failed to deliver reminder {id}: {e}"),
            }

            // One attempt per reminder, delivered or not
            self.mark(id).await;
        }

        Ok(())
    }

    async fn mark(&self, id: i64) {
        if let Err(e) = self.reminders.mark_notified(id).await {
            error!("Failed to mark reminder {id} as notified: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::transport::testing::RecordingTransport;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::atomic::Ordering;

    const GROUP: &str = "g1@g.us";

    async fn scheduler() -> (ReminderScheduler, ReminderStore) {
        let store = ReminderStore::new(Database::in_memory().await.unwrap());
        let scheduler = ReminderScheduler::new(
            store.clone(),
            AuthorizationGate::new("Familie"),
            SharedTransport::new(),
            Duration::from_secs(60),
        );
        (scheduler, store)
    }

    fn past() -> chrono::DateTime<Utc> {
        Utc::now() - ChronoDuration::minutes(5)
    }

    #[tokio::test]
    async fn test_due_reminder_is_delivered_and_marked() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (scheduler, store) = scheduler().await;
        let transport = RecordingTransport::new().with_name(GROUP, "Familie");

        store
            .create("brot kaufen", Some(GROUP), Some("Alex"), past())
            .await
            .unwrap();

        scheduler.tick(&transport).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, GROUP);
        assert_eq!(sent[0].1, "Erinnerung: brot kaufen (faellig jetzt)");
        assert!(store.list_due(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_conversation_is_abandoned_without_send() {
        let (scheduler, store) = scheduler().await;
        let transport = RecordingTransport::new().with_name(GROUP, "Familie");

        store.create("verwaist", None, None, past()).await.unwrap();

        scheduler.tick(&transport).await.unwrap();

        assert!(transport.sent().is_empty());
        assert!(store.list_due(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_conversation_is_abandoned() {
        let (scheduler, store) = scheduler().await;
        // Name no longer matches the allow-list
        let transport = RecordingTransport::new().with_name(GROUP, "Andere Gruppe");

        store
            .create("geheim", Some(GROUP), None, past())
            .await
            .unwrap();

        scheduler.tick(&transport).await.unwrap();

        assert!(transport.sent().is_empty());
        assert!(store.list_due(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_still_marks_notified() {
        let (scheduler, store) = scheduler().await;
        let transport = RecordingTransport::new().with_name(GROUP, "Familie");
        transport.fail_sends.store(true, Ordering::SeqCst);

        store
            .create("verloren", Some(GROUP), None, past())
            .await
            .unwrap();

        scheduler.tick(&transport).await.unwrap();

        // No retry on the next tick
        scheduler.tick(&transport).await.unwrap();
        assert!(transport.sent().is_empty());
        assert!(store.list_due(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_bad_reminder_does_not_block_the_rest() {
        let (scheduler, store) = scheduler().await;
        let transport = RecordingTransport::new().with_name(GROUP, "Familie");

        store.create("kaputt", None, None, past()).await.unwrap();
        store
            .create("gesund", Some(GROUP), None, past())
            .await
            .unwrap();

        scheduler.tick(&transport).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("gesund"));
    }

    #[tokio::test]
    async fn test_future_reminders_stay_queued() {
        let (scheduler, store) = scheduler().await;
        let transport = RecordingTransport::new().with_name(GROUP, "Familie");

        store
            .create("später", Some(GROUP), None, Utc::now() + ChronoDuration::hours(2))
            .await
            .unwrap();

        scheduler.tick(&transport).await.unwrap();

        assert!(transport.sent().is_empty());
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }
}
