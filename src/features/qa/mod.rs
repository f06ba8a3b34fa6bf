//! # Question Answering Feature
//!
//! Forwards questions to the chat model and falls back to canned answers
//! whenever the model is unavailable. Never fails outward.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true

use async_trait::async_trait;
use chrono::Local;
use log::{debug, error, warn};
use openai::chat::{ChatCompletion, ChatCompletionMessage, ChatCompletionMessageRole};
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

const MODEL_TIMEOUT: Duration = Duration::from_secs(45);

/// Free-form Q&A collaborator seam
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    /// Answer a question; degrades to a placeholder, never errors
    async fn answer(&self, question: &str) -> String;
}

/// OpenAI-backed answerer with a local fallback
pub struct QaService {
    model: String,
    enabled: bool,
}

impl QaService {
    /// `api_key` may be empty; the service then serves fallback answers only
    pub fn new(api_key: &str, model: &str) -> Self {
        if api_key.is_empty() {
            warn!("No OpenAI API key configured, question answering uses fallback answers");
        }
        QaService {
            model: model.to_string(),
            enabled: !api_key.is_empty(),
        }
    }

    async fn ask_model(&self, question: &str) -> anyhow::Result<String> {
        let request_id = Uuid::new_v4();
        debug!("[{request_id}] Sending question to {}", self.model);

        let messages = vec![ChatCompletionMessage {
            role: ChatCompletionMessageRole::User,
            content: Some(question.to_string()),
            name: None,
            function_call: None,
            tool_call_id: None,
            tool_calls: None,
        }];

        let completion = timeout(
            MODEL_TIMEOUT,
            ChatCompletion::builder(&self.model, messages).create(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("OpenAI request timed out after 45 seconds"))??;

        let answer = completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
            .trim()
            .to_string();

        debug!("[{request_id}] Got answer: {} chars", answer.len());
        Ok(answer)
    }
}

#[async_trait]
impl QuestionAnswerer for QaService {
    async fn answer(&self, question: &str) -> String {
        let question = question.trim();
        if question.is_empty() || !self.enabled {
            return fallback_answer(question);
        }

        match self.ask_model(question).await {
            Ok(answer) if !answer.is_empty() => answer,
            Ok(_) => fallback_answer(question),
            Err(e) => {
                error!("OpenAI request failed, using fallback answer: {e}");
                fallback_answer(question)
            }
        }
    }
}

/// Canned answers for the handful of questions the butler can field offline
pub fn fallback_answer(question: &str) -> String {
    if question.is_empty() {
        return "Ich bin mir nicht sicher, wie ich helfen kann, aber ich lerne noch.".to_string();
    }

    let normalized = question.to_lowercase();
    if normalized.contains("hauptstadt") && normalized.contains("italien") {
        return "Die Hauptstadt von Italien ist Rom.".to_string();
    }
    if normalized.contains("hauptstadt") && normalized.contains("deutschland") {
        return "Die Hauptstadt von Deutschland ist Berlin.".to_string();
    }
    if normalized.contains("zeit") {
        return format!("Es ist gerade {}.", Local::now().format("%H:%M:%S"));
    }

    "Ich habe leider keine KI-Antwort verfuegbar und gebe daher eine Platzhalter-Antwort."
        .to_string()
}
