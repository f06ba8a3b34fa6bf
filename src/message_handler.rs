//! # Feature: Message Pipeline
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: No
//!
//! Wires every inbound envelope through the full pipeline: self-filter,
//! content classification, authorization, archival, then the response
//! stages. Text runs command handling, reminder extraction, and question
//! answering; voice notes are transcribed first and then follow the same
//! reminder and question stages. A message can produce more than one
//! reply: an embedded temporal phrase and a question mark each get their
//! own response.
//!
//! ## Changelog
//! - 1.1.0: Voice transcripts now back-fill the archived placeholder row
//! - 1.0.0: Initial implementation

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use log::{debug, error, info, warn};

use crate::context::BotContext;
use crate::features::reminders::extractor;
use crate::transport::{classify, AudioPayload, ChatTransport, Envelope, MessageKind};

/// Leading words that flag a sentence as a question even without `?`
const INTERROGATIVES: &[&str] = &[
    "was", "wie", "wer", "wo", "wann", "warum", "what", "how", "why", "when", "where", "who",
];

pub struct MessageHandler {
    ctx: BotContext,
}

impl MessageHandler {
    pub fn new(ctx: BotContext) -> Self {
        MessageHandler { ctx }
    }

    /// Process one inbound envelope; failures are logged, never propagated
    pub async fn process(&self, envelope: Envelope) {
        if let Err(e) = self.handle(envelope).await {
            error!("Failed to process inbound message: {e:#}");
        }
    }

    async fn handle(&self, envelope: Envelope) -> Result<()> {
        if envelope.from_self {
            return Ok(());
        }

        let kind = match classify(&envelope.content) {
            MessageKind::Unrecognized => {
                debug!(
                    "Ignoring unrecognized content in conversation {}",
                    envelope.conversation_id
                );
                return Ok(());
            }
            kind => kind,
        };

        let Some(transport) = self.ctx.transport.get().await else {
            warn!("No live transport connection, dropping inbound message");
            return Ok(());
        };

        if !self
            .ctx
            .gate
            .is_allowed(&envelope.conversation_id, transport.as_ref())
            .await
        {
            debug!(
                "Dropping message from disallowed conversation {}",
                envelope.conversation_id
            );
            return Ok(());
        }

        match kind {
            MessageKind::Text(text) => self.handle_text(&envelope, &text, transport.as_ref()).await,
            MessageKind::Audio(payload) => {
                self.handle_audio(&envelope, &payload, transport.as_ref())
                    .await
            }
            MessageKind::Unrecognized => Ok(()),
        }
    }

    async fn handle_text(
        &self,
        envelope: &Envelope,
        text: &str,
        transport: &dyn ChatTransport,
    ) -> Result<()> {
        self.ctx
            .database
            .save_message(&envelope.conversation_id, text, envelope.timestamp_ms(), "text")
            .await?;

        if text.trim().is_empty() {
            return Ok(());
        }

        if self
            .handle_command(&envelope.conversation_id, text, transport)
            .await?
        {
            return Ok(());
        }

        self.respond_to_content(envelope, text, transport).await
    }

    async fn handle_audio(
        &self,
        envelope: &Envelope,
        payload: &AudioPayload,
        transport: &dyn ChatTransport,
    ) -> Result<()> {
        let message_id = self
            .ctx
            .database
            .save_message(
                &envelope.conversation_id,
                "[Sprachnachricht]",
                envelope.timestamp_ms(),
                "audio",
            )
            .await?;

        let Some(transcript) = self
            .ctx
            .speech
            .transcribe(&payload.data, &payload.filename_hint)
            .await
        else {
            return Ok(());
        };

        self.ctx
            .database
            .update_message_text(message_id, &transcript)
            .await?;

        let echo = format!("Transkription: {transcript}");
        if let Err(e) = transport
            .send_message(&envelope.conversation_id, &echo)
            .await
        {
            error!("Failed to send transcription echo: {e:#}");
        }

        self.respond_to_content(envelope, &transcript, transport)
            .await
    }

    /// Reminder extraction and question answering run independently: a
    /// single message can yield both a confirmation and an answer.
    async fn respond_to_content(
        &self,
        envelope: &Envelope,
        text: &str,
        transport: &dyn ChatTransport,
    ) -> Result<()> {
        if let Err(e) = self.try_create_reminder(envelope, text, transport).await {
            error!("Failed to create reminder: {e:#}");
        }

        if is_question(text) {
            let answer = self.ctx.qa.answer(text).await;
            if let Err(e) = transport
                .send_message(&envelope.conversation_id, &answer)
                .await
            {
                error!("Failed to send answer: {e:#}");
            }
        }

        Ok(())
    }

    async fn try_create_reminder(
        &self,
        envelope: &Envelope,
        text: &str,
        transport: &dyn ChatTransport,
    ) -> Result<()> {
        let Some(extraction) = extractor::extract(text, Utc::now()) else {
            return Ok(());
        };

        let sender_name = envelope
            .sender_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let id = self
            .ctx
            .reminders
            .create(
                &extraction.reminder_text,
                Some(&envelope.conversation_id),
                sender_name,
                extraction.due_at,
            )
            .await?;
        info!(
            "Created reminder {id} due at {} in conversation {}",
            extraction.due_at, envelope.conversation_id
        );

        let due = format_due(extraction.due_at);
        let confirmation = match sender_name {
            Some(name) => format!(
                "Okay {name}, ich erinnere dich an \"{}\" am {due}.",
                extraction.reminder_text
            ),
            None => format!(
                "Erinnerung gespeichert: \"{}\" am {due}.",
                extraction.reminder_text
            ),
        };
        transport
            .send_message(&envelope.conversation_id, &confirmation)
            .await?;
        Ok(())
    }

    /// Slash commands; returns true when the message was consumed
    async fn handle_command(
        &self,
        conversation_id: &str,
        text: &str,
        transport: &dyn ChatTransport,
    ) -> Result<bool> {
        match text.trim().to_lowercase().as_str() {
            "/list" => {
                let pending = self.ctx.reminders.list_pending().await?;
                let reply = if pending.is_empty() {
                    "Es sind keine Erinnerungen offen.".to_string()
                } else {
                    pending
                        .iter()
                        .map(|r| {
                            format!(
                                "#{} - {} (faellig am {})",
                                r.id,
                                r.reminder_text,
                                format_due(r.due_at)
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                transport.send_message(conversation_id, &reply).await?;
                Ok(true)
            }
            "/clear" => {
                self.ctx.reminders.clear_all().await?;
                info!("Cleared all messages and reminders on request");
                transport
                    .send_message(
                        conversation_id,
                        "Alle Nachrichten und Erinnerungen wurden geloescht.",
                    )
                    .await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Due-date display in the bot's local timezone
fn format_due(due_at: DateTime<Utc>) -> String {
    due_at
        .with_timezone(&Local)
        .format("%d.%m.%Y %H:%M")
        .to_string()
}

/// A message counts as a question when it contains `?` anywhere or opens
/// with an interrogative word.
fn is_question(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    if normalized.contains('?') {
        return true;
    }
    let first = normalized.split_whitespace().next().unwrap_or("");
    INTERROGATIVES.contains(&first)
}
