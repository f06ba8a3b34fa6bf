//! Chat transport seam and inbound envelope model
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! The concrete transport (socket handshake, session persistence,
//! reconnects) lives outside this crate. It feeds `Envelope`s in and
//! implements `ChatTransport` for everything going out. The live handle is
//! replaceable at any time, including being briefly absent during a
//! reconnect.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ephemeral wrappers deeper than this are treated as unrecognized
pub const MAX_EPHEMERAL_DEPTH: usize = 3;

/// Outbound surface of the chat transport
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver a text message to a conversation
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<()>;

    /// Resolve a conversation's display name
    async fn conversation_name(&self, conversation_id: &str) -> Result<String>;
}

/// Replaceable handle to the currently live transport connection
///
/// The transport layer swaps the inner reference on reconnect; consumers
/// grab a snapshot per operation and never hold it across ticks.
#[derive(Clone, Default)]
pub struct SharedTransport {
    inner: Arc<RwLock<Option<Arc<dyn ChatTransport>>>>,
}

impl SharedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or swap in) a live connection
    pub async fn replace(&self, transport: Arc<dyn ChatTransport>) {
        *self.inner.write().await = Some(transport);
    }

    /// Drop the live connection, e.g. while reconnecting
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    /// Snapshot of the current connection, if any
    pub async fn get(&self) -> Option<Arc<dyn ChatTransport>> {
        self.inner.read().await.clone()
    }
}

/// Raw audio attachment carried by an envelope
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub data: Vec<u8>,
    /// Original filename or extension hint for the transcriber
    pub filename_hint: String,
}

/// Inbound message content as the transport delivers it
#[derive(Debug, Clone)]
pub enum RawContent {
    /// Plain conversation text
    Conversation(String),
    /// Extended/quoted text message
    ExtendedText(String),
    /// Voice or audio attachment
    Audio(AudioPayload),
    /// Disappearing-message wrapper around another content node
    Ephemeral(Box<RawContent>),
    /// Anything else, labeled with the wire kind for logging
    Unsupported(String),
}

/// One inbound message envelope
#[derive(Debug, Clone)]
pub struct Envelope {
    pub sender_id: String,
    pub conversation_id: String,
    /// Push name of the requester, display-only
    pub sender_name: Option<String>,
    pub content: RawContent,
    /// Transport timestamp; absent or bogus values default to now
    pub timestamp: Option<DateTime<Utc>>,
    /// Set for messages the bot itself sent
    pub from_self: bool,
}

impl Envelope {
    /// Archival timestamp in epoch milliseconds
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.unwrap_or_else(Utc::now).timestamp_millis()
    }
}

/// Classified message kind driving the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Text(String),
    Audio(AudioPayload),
    Unrecognized,
}

/// Classify raw content into a pipeline message kind
///
/// Ephemeral wrappers are unwrapped iteratively; a chain that never
/// terminates within `MAX_EPHEMERAL_DEPTH` is unrecognized.
pub fn classify(content: &RawContent) -> MessageKind {
    let mut current = content;
    for _ in 0..=MAX_EPHEMERAL_DEPTH {
        match current {
            RawContent::Conversation(text) | RawContent::ExtendedText(text) => {
                return MessageKind::Text(text.clone());
            }
            RawContent::Audio(payload) => return MessageKind::Audio(payload.clone()),
            RawContent::Ephemeral(inner) => current = inner,
            RawContent::Unsupported(_) => return MessageKind::Unrecognized,
        }
    }
    MessageKind::Unrecognized
}
