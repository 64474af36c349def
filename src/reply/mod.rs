//! Bot reply provider abstraction.
//!
//! `ReplyProvider` is an enum over concrete reply backends. Today there is
//! only [`providers::canned::CannedProvider`], which ignores the user's text
//! and returns a fixed string. Adding a backend = new module in
//! `providers/` + new variant + new `reply_to` arm.

pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown reply provider: {0}")]
    UnknownProvider(String),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available reply backends. Cheap to clone; shared by every deferred
/// reply task.
#[derive(Debug, Clone)]
pub enum ReplyProvider {
    Canned(providers::canned::CannedProvider),
}

impl ReplyProvider {
    /// Produce the bot's reply to `content`.
    pub fn reply_to(&self, content: &str) -> String {
        match self {
            ReplyProvider::Canned(p) => p.reply_to(content),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReplyProvider::Canned(_) => "canned",
        }
    }
}
