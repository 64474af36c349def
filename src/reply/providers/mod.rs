//! Reply provider implementations.
//!
//! `build(config)` is the factory, called once when the manager is created.

pub mod canned;

use crate::config::ConversationConfig;
use crate::reply::{ProviderError, ReplyProvider};

/// Construct a [`ReplyProvider`] from conversation config.
pub fn build(config: &ConversationConfig) -> Result<ReplyProvider, ProviderError> {
    match config.reply_provider.as_str() {
        "canned" => Ok(ReplyProvider::Canned(canned::CannedProvider::new(
            config.reply_text.clone(),
        ))),
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}
