//! # Conversation Authorization Feature
//!
//! Gates reminder creation and delivery to a single allow-listed group
//! conversation, with a process-lifetime name cache.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use dashmap::DashMap;
use log::{debug, error};
use std::sync::Arc;

use crate::transport::ChatTransport;

/// Suffix marking group conversation ids on the wire
pub const GROUP_ID_SUFFIX: &str = "@g.us";

/// Allow-list gate over conversation ids
///
/// Direct one-to-one conversations are never allowed. Group conversations
/// are allowed exactly when their resolved display name, trimmed, equals
/// the configured name. Resolved names (including failed resolutions,
/// cached as empty) live for the process lifetime.
#[derive(Clone)]
pub struct AuthorizationGate {
    allowed_name: String,
    names: Arc<DashMap<String, String>>,
}

impl AuthorizationGate {
    pub fn new(allowed_name: &str) -> Self {
        AuthorizationGate {
            allowed_name: allowed_name.trim().to_string(),
            names: Arc::new(DashMap::new()),
        }
    }

    /// May this conversation create reminders and receive messages?
    pub async fn is_allowed(&self, conversation_id: &str, transport: &dyn ChatTransport) -> bool {
        if self.allowed_name.is_empty() || conversation_id.is_empty() {
            return false;
        }
        if !is_group_conversation(conversation_id) {
            return false;
        }

        let name = self.resolve_name(conversation_id, transport).await;
        name.trim() == self.allowed_name
    }

    /// Cached display-name resolution; a failed lookup caches an empty
    /// name so the transport is not hammered on every check.
    async fn resolve_name(&self, conversation_id: &str, transport: &dyn ChatTransport) -> String {
        if let Some(cached) = self.names.get(conversation_id) {
            return cached.clone();
        }

        match transport.conversation_name(conversation_id).await {
            Ok(name) => {
                debug!("Resolved conversation {conversation_id} to '{name}'");
                self.names.insert(conversation_id.to_string(), name.clone());
                name
            }
            Err(e) => {
                error!("Could not resolve name of conversation {conversation_id}: {e}");
                self.names.insert(conversation_id.to_string(), String::new());
                String::new()
            }
        }
    }
}

/// Whether an id denotes a group conversation
pub fn is_group_conversation(conversation_id: &str) -> bool {
    conversation_id.ends_with(GROUP_ID_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingTransport;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_direct_conversation_is_never_allowed() {
        let transport = RecordingTransport::new().with_name("user@s.whatsapp.net", "Familie");
        let gate = AuthorizationGate::new("Familie");

        assert!(!gate.is_allowed("user@s.whatsapp.net", &transport).await);
        // The kind check short-circuits before any name lookup
        assert_eq!(transport.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_group_with_matching_name_is_allowed() {
        let transport = RecordingTransport::new().with_name("g1@g.us", "Familie");
        let gate = AuthorizationGate::new(" Familie ");

        assert!(gate.is_allowed("g1@g.us", &transport).await);
    }

    #[tokio::test]
    async fn test_name_comparison_is_case_sensitive() {
        let transport = RecordingTransport::new().with_name("g1@g.us", "familie");
        let gate = AuthorizationGate::new("Familie");

        assert!(!gate.is_allowed("g1@g.us", &transport).await);
    }

    #[tokio::test]
    async fn test_resolution_is_cached_per_conversation() {
        let transport = RecordingTransport::new().with_name("g1@g.us", "Familie");
        let gate = AuthorizationGate::new("Familie");

        assert!(gate.is_allowed("g1@g.us", &transport).await);
        assert!(gate.is_allowed("g1@g.us", &transport).await);
        assert!(gate.is_allowed("g1@g.us", &transport).await);
        assert_eq!(transport.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_resolution_caches_disallowed() {
        let transport = RecordingTransport::new();
        transport.fail_lookups.store(true, Ordering::SeqCst);
        let gate = AuthorizationGate::new("Familie");

        assert!(!gate.is_allowed("g1@g.us", &transport).await);

        // Lookups recover, but the empty name is already cached
        transport.fail_lookups.store(false, Ordering::SeqCst);
        let transport = transport.with_name("g1@g.us", "Familie");
        assert!(!gate.is_allowed("g1@g.us", &transport).await);
        assert_eq!(transport.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_configured_name_disallows_everything() {
        let transport = RecordingTransport::new().with_name("g1@g.us", "");
        let gate = AuthorizationGate::new("   ");

        assert!(!gate.is_allowed("g1@g.us", &transport).await);
    }
}
