//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `UI_CHATBOT_LOG_LEVEL` and `UI_CHATBOT_REPLY_DELAY_MS`
//! env overrides.

use std::{
    env, fs,
    path::Path,
    time::Duration,
};

use serde::Deserialize;

use crate::conversation::{DEFAULT_GREETING, DEFAULT_REPLY_DELAY, DEFAULT_REPLY_TEXT};
use crate::error::AppError;

/// How the console channel prints the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    /// Human-readable `[bot] ...` lines.
    Text,
    /// One JSON object per message.
    Json,
}

/// PTY (console) channel configuration.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    pub enabled: bool,
    pub format: RenderFormat,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub pty: PtyConfig,
}

/// Conversation behaviour: seed greeting, canned reply, reply latency.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub greeting: String,
    /// Reply backend name; only `"canned"` exists.
    pub reply_provider: String,
    pub reply_text: String,
    pub reply_delay: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            reply_provider: default_reply_provider(),
            reply_text: DEFAULT_REPLY_TEXT.to_string(),
            reply_delay: DEFAULT_REPLY_DELAY,
        }
    }
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub log_level: String,
    pub conversation: ConversationConfig,
    pub comms: CommsConfig,
}

impl Config {
    /// Returns `true` if the PTY channel should be loaded.
    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }
}

/// Env-var overrides, passed explicitly so tests never mutate the process env.
#[derive(Debug, Default, Clone)]
pub struct Overrides<'a> {
    pub log_level: Option<&'a str>,
    pub reply_delay_ms: Option<&'a str>,
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    app: RawApp,
    #[serde(default)]
    conversation: RawConversation,
    #[serde(default)]
    comms: RawComms,
}

#[derive(Deserialize)]
struct RawApp {
    name: String,
    log_level: String,
}

#[derive(Deserialize)]
struct RawConversation {
    #[serde(default = "default_greeting")]
    greeting: String,
    #[serde(rename = "provider", default = "default_reply_provider")]
    reply_provider: String,
    #[serde(default = "default_reply_text")]
    reply_text: String,
    #[serde(default = "default_reply_delay_ms")]
    reply_delay_ms: u64,
}

impl Default for RawConversation {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            reply_provider: default_reply_provider(),
            reply_text: default_reply_text(),
            reply_delay_ms: default_reply_delay_ms(),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    pty: RawPty,
}

#[derive(Deserialize)]
struct RawPty {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_format")]
    format: RenderFormat,
}

impl Default for RawPty {
    fn default() -> Self {
        Self { enabled: true, format: default_format() }
    }
}

fn default_greeting() -> String { DEFAULT_GREETING.to_string() }
fn default_reply_provider() -> String { "canned".to_string() }
fn default_reply_text() -> String { DEFAULT_REPLY_TEXT.to_string() }
fn default_reply_delay_ms() -> u64 { DEFAULT_REPLY_DELAY.as_millis() as u64 }
fn default_format() -> RenderFormat { RenderFormat::Text }

fn default_true() -> bool {
    true
}

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let log_level = env::var("UI_CHATBOT_LOG_LEVEL").ok();
    let reply_delay_ms = env::var("UI_CHATBOT_REPLY_DELAY_MS").ok();
    load_from(
        Path::new("config/default.toml"),
        Overrides {
            log_level: log_level.as_deref(),
            reply_delay_ms: reply_delay_ms.as_deref(),
        },
    )
}

/// Internal loader — accepts an explicit path and overrides.
pub fn load_from(path: &Path, overrides: Overrides<'_>) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    parse(&raw, overrides)
        .map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
}

fn parse(raw: &str, overrides: Overrides<'_>) -> Result<Config, AppError> {
    let parsed: RawConfig = toml::from_str(raw)
        .map_err(|e| AppError::Config(format!("parse error: {e}")))?;

    let log_level = overrides.log_level.unwrap_or(&parsed.app.log_level).to_string();

    let reply_delay_ms = match overrides.reply_delay_ms {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map_err(|e| AppError::Config(format!("invalid reply delay '{v}': {e}")))?,
        None => parsed.conversation.reply_delay_ms,
    };

    if parsed.conversation.greeting.trim().is_empty() {
        return Err(AppError::Config("conversation.greeting must not be empty".into()));
    }
    if parsed.conversation.reply_text.trim().is_empty() {
        return Err(AppError::Config("conversation.reply_text must not be empty".into()));
    }

    Ok(Config {
        app_name: parsed.app.name,
        log_level,
        conversation: ConversationConfig {
            greeting: parsed.conversation.greeting,
            reply_provider: parsed.conversation.reply_provider,
            reply_text: parsed.conversation.reply_text,
            reply_delay: Duration::from_millis(reply_delay_ms),
        },
        comms: CommsConfig {
            pty: PtyConfig {
                enabled: parsed.comms.pty.enabled,
                format: parsed.comms.pty.format,
            },
        },
    })
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — default conversation, text console.
#[cfg(test)]
impl Config {
    pub fn test_default() -> Self {
        Self {
            app_name: "test".into(),
            log_level: "info".into(),
            conversation: ConversationConfig::default(),
            comms: CommsConfig {
                pty: PtyConfig { enabled: true, format: RenderFormat::Text },
            },
        }
    }
}
