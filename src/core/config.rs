//! Environment-driven configuration
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Parse the minute field of REMINDER_CRON into a poll interval
//! - 1.0.0: Initial implementation with env defaults

use anyhow::{Context, Result};
use log::warn;
use std::time::Duration;

/// Fallback dispatch poll period when REMINDER_CRON cannot be parsed
const DEFAULT_POLL: Duration = Duration::from_secs(60);

/// Runtime configuration, loaded once at startup
///
/// Every field has a default so the bot comes up without any environment
/// at all (AI features degrade to fallbacks without an API key).
#[derive(Debug, Clone)]
pub struct Config {
    /// Listening port for the embedding process's health endpoint
    pub port: u16,
    /// SQLite file for messages and reminders
    pub database_path: String,
    /// Transport session/auth storage directory
    pub session_dir: String,
    /// OpenAI API key; empty disables transcription and model-backed answers
    pub openai_api_key: String,
    /// Whisper model for voice transcription
    pub whisper_model: String,
    /// Chat model for question answering
    pub text_model: String,
    /// Display name of the single allow-listed group conversation
    pub allowed_group_name: String,
    /// Cron-style dispatch schedule; only the minute field is honored
    pub reminder_cron: String,
    /// Default log level for `init_logging`
    pub log_level: String,
}

impl Config {
    /// Load a `.env` file (if present) and read the configuration
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        let port = env_or("PORT", "3000");
        let port: u16 = port
            .parse()
            .with_context(|| format!("PORT is not a valid port number: {port}"))?;

        let config = Config {
            port,
            database_path: env_or("DB_PATH", "data/storage.sqlite"),
            session_dir: env_or("SESSION_FOLDER", "session"),
            openai_api_key: env_or("OPENAI_API_KEY", ""),
            whisper_model: env_or("WHISPER_MODEL", "whisper-1"),
            text_model: env_or("OPENAI_TEXT_MODEL", "gpt-4o-mini"),
            allowed_group_name: env_or("ALLOWED_GROUP_NAME", "SmartAssistant")
                .trim()
                .to_string(),
            reminder_cron: env_or("REMINDER_CRON", "*/1 * * * *"),
            log_level: env_or("LOG_LEVEL", "info"),
        };

        // The openai crate reads credentials from the environment, not from
        // our config. Export under both names it has used across versions.
        if !config.openai_api_key.is_empty() {
            std::env::set_var("OPENAI_API_KEY", &config.openai_api_key);
            std::env::set_var("OPENAI_KEY", &config.openai_api_key);
        }

        Ok(config)
    }

    /// Dispatch poll period derived from `reminder_cron`
    pub fn poll_interval(&self) -> Duration {
        poll_interval_from_cron(&self.reminder_cron)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Initialize env_logger with the configured default level
///
/// RUST_LOG still wins when set, matching env_logger's usual precedence.
pub fn init_logging(config: &Config) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.log_level),
    )
    .init();
}

/// Derive a poll period from a five-field cron expression
///
/// Only the minute field matters for a fixed-interval dispatcher: `*` and
/// `*/N` map to 1 and N minutes. Anything else falls back to one minute.
pub fn poll_interval_from_cron(expr: &str) -> Duration {
    let minute_field = match expr.split_whitespace().next() {
        Some(field) if expr.split_whitespace().count() == 5 => field,
        _ => {
            warn!("Unrecognized REMINDER_CRON '{expr}', polling every minute");
            return DEFAULT_POLL;
        }
    };

    if minute_field == "*" {
        return Duration::from_secs(60);
    }

    if let Some(step) = minute_field.strip_prefix("*/") {
        if let Ok(minutes) = step.parse::<u64>() {
            if minutes > 0 {
                return Duration::from_secs(minutes * 60);
            }
        }
    }

    warn!("Unsupported REMINDER_CRON minute field '{minute_field}', polling every minute");
    DEFAULT_POLL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_every_minute() {
        assert_eq!(
            poll_interval_from_cron("*/1 * * * *"),
            Duration::from_secs(60)
        );
        assert_eq!(poll_interval_from_cron("* * * * *"), Duration::from_secs(60));
    }

    #[test]
    fn test_poll_interval_step() {
        assert_eq!(
            poll_interval_from_cron("*/5 * * * *"),
            Duration::from_secs(300)
        );
        assert_eq!(
            poll_interval_from_cron("*/15 * * * *"),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn test_poll_interval_fallback() {
        assert_eq!(poll_interval_from_cron(""), DEFAULT_POLL);
        assert_eq!(poll_interval_from_cron("not a cron"), DEFAULT_POLL);
        assert_eq!(poll_interval_from_cron("30 2 * * *"), DEFAULT_POLL);
        assert_eq!(poll_interval_from_cron("*/0 * * * *"), DEFAULT_POLL);
    }
}
