// Core layer - configuration and logging setup
pub mod core;

// Features layer - all feature modules
pub mod features;

// Infrastructure
pub mod database;
pub mod transport;

// Application layer
pub mod context;
pub mod message_handler;

// Re-export core config
pub use core::{init_logging, Config};

// Re-export infrastructure types
pub use database::Database;
pub use transport::{
    classify, AudioPayload, ChatTransport, Envelope, MessageKind, RawContent, SharedTransport,
};

// Re-export application types
pub use context::BotContext;
pub use message_handler::MessageHandler;

// Re-export feature items
pub use features::{
    // Audio
    AudioTranscriber, SpeechToText,
    // Authorization
    AuthorizationGate,
    // Question answering
    QaService, QuestionAnswerer,
    // Reminders
    Reminder, ReminderScheduler, ReminderStore,
};
