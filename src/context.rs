//! Shared service context
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! One bundle of the services the pipeline and the dispatcher need,
//! built once at startup and cloned into each component. Holding the
//! replaceable transport handle here keeps module-level globals out of
//! the picture and lets tests swap in fakes.

use std::sync::Arc;

use crate::database::Database;
use crate::features::audio::SpeechToText;
use crate::features::authorization::AuthorizationGate;
use crate::features::qa::QuestionAnswerer;
use crate::features::reminders::ReminderStore;
use crate::transport::SharedTransport;

/// Shared context for the message pipeline and the reminder dispatcher
#[derive(Clone)]
pub struct BotContext {
    pub database: Database,
    pub reminders: ReminderStore,
    pub gate: AuthorizationGate,
    pub transport: SharedTransport,
    pub qa: Arc<dyn QuestionAnswerer>,
    pub speech: Arc<dyn SpeechToText>,
}

impl BotContext {
    pub fn new(
        database: Database,
        gate: AuthorizationGate,
        transport: SharedTransport,
        qa: Arc<dyn QuestionAnswerer>,
        speech: Arc<dyn SpeechToText>,
    ) -> Self {
        let reminders = ReminderStore::new(database.clone());
        BotContext {
            database,
            reminders,
            gate,
            transport,
            qa,
            speech,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<BotContext>();
    }
}
