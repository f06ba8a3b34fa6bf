//! Whisper transcription of voice-message buffers
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! The audio bytes arrive with the envelope; they are staged in a temp
//! file and shipped to the transcription endpoint via curl. Every failure
//! is absorbed into `None` so a broken voice message never surfaces as an
//! error in the conversation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::Command;
use tokio::fs;

/// Speech-to-text collaborator seam
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe an audio buffer; `None` means "no usable text"
    async fn transcribe(&self, audio: &[u8], filename_hint: &str) -> Option<String>;
}

pub struct AudioTranscriber {
    api_key: String,
    model: String,
}

impl AudioTranscriber {
    pub fn new(api_key: String, model: String) -> Self {
        AudioTranscriber { api_key, model }
    }

    async fn transcribe_file(&self, file_path: &str) -> Result<String> {
        info!("Transcribing audio file: {file_path}");

        let output = Command::new("curl")
            .args([
                "https://api.openai.com/v1/audio/transcriptions",
                "-H",
                &format!("Authorization: Bearer {}", self.api_key),
                "-H",
                "Content-Type: multipart/form-data",
                "-F",
                &format!("file=@{file_path}"),
                "-F",
                &format!("model={}", self.model),
            ])
            .output()?;

        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Transcription request failed: {}", error_msg);
        }

        let response = String::from_utf8(output.stdout)?;
        let json: serde_json::Value = serde_json::from_str(&response)?;

        if let Some(text) = json.get("text").and_then(|t| t.as_str()) {
            info!("Transcription successful, length: {} characters", text.len());
            Ok(text.to_string())
        } else if let Some(api_error) = json.get("error") {
            anyhow::bail!("Transcription API error: {}", api_error)
        } else {
            anyhow::bail!("Unexpected transcription response format")
        }
    }

    fn temp_path(filename_hint: &str) -> PathBuf {
        let safe_hint: String = filename_hint
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        std::env::temp_dir().join(format!(
            "voice-{}-{safe_hint}",
            Utc::now().timestamp_millis()
        ))
    }
}

#[async_trait]
impl SpeechToText for AudioTranscriber {
    async fn transcribe(&self, audio: &[u8], filename_hint: &str) -> Option<String> {
        if audio.is_empty() {
            return None;
        }
        if self.api_key.is_empty() {
            warn!("No OpenAI API key configured, skipping transcription");
            return None;
        }

        let temp_file = Self::temp_path(filename_hint);
        if let Err(e) = fs::write(&temp_file, audio).await {
            error!("Failed to stage audio buffer at {temp_file:?}: {e}");
            return None;
        }

        let result = self.transcribe_file(&temp_file.to_string_lossy()).await;

        if let Err(e) = fs::remove_file(&temp_file).await {
            warn!("Failed to cleanup temp file {temp_file:?}: {e}");
        }

        match result {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            Err(e) => {
                error!("Transcription failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_buffer_yields_none() {
        let transcriber = AudioTranscriber::new("key".to_string(), "whisper-1".to_string());
        assert_eq!(transcriber.transcribe(&[], "voice.ogg").await, None);
    }

    #[tokio::test]
    async fn test_missing_api_key_yields_none() {
        let transcriber = AudioTranscriber::new(String::new(), "whisper-1".to_string());
        assert_eq!(transcriber.transcribe(&[1, 2, 3], "voice.ogg").await, None);
    }

    #[test]
    fn test_temp_path_sanitizes_hint() {
        let path = AudioTranscriber::temp_path("../../etc/passwd voice.ogg");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(!name.contains('/'));
        assert!(!name.contains(' '));
        assert!(name.ends_with("voice.ogg"));
    }
}
