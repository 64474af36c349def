//! Canned provider — always answers with the same configured text.

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CannedProvider {
    text: Arc<str>,
}

impl CannedProvider {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    pub fn reply_to(&self, _content: &str) -> String {
        self.text.to_string()
    }
}
