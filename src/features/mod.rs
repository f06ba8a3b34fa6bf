//! # Features Layer
//!
//! Feature modules of the butler bot.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

pub mod audio;
pub mod authorization;
pub mod qa;
pub mod reminders;

// Re-export feature items
pub use audio::{AudioTranscriber, SpeechToText};
pub use authorization::AuthorizationGate;
pub use qa::{QaService, QuestionAnswerer};
pub use reminders::{Reminder, ReminderScheduler, ReminderStore};
