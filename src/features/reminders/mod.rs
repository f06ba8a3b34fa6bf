//! # Reminders Feature
//!
//! Turns free-form messages into scheduled reminders and delivers them
//! when due.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod extractor;
pub mod scheduler;
pub mod store;

pub use extractor::{extract, Extraction};
pub use scheduler::ReminderScheduler;
pub use store::{Reminder, ReminderStore};
