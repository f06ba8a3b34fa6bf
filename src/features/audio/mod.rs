//! # Audio Feature
//!
//! Whisper-powered transcription of inbound voice messages.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true

pub mod transcriber;

pub use transcriber::{AudioTranscriber, SpeechToText};
