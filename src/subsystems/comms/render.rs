//! Transcript rendering for console channels.
//!
//! [`Renderer`] remembers how many messages it has already printed and turns
//! each new [`Snapshot`] into the lines for the messages appended since.

use crate::config::RenderFormat;
use crate::conversation::{Message, Sender, Snapshot};
use crate::error::AppError;

pub const TITLE: &str = "AI Chat Assistant";
pub const PLACEHOLDER: &str = "Type your message here...";

pub struct Renderer {
    format: RenderFormat,
    rendered: usize,
}

impl Renderer {
    pub fn new(format: RenderFormat) -> Self {
        Self { format, rendered: 0 }
    }

    /// Banner printed once when the channel starts. Empty in JSON mode so
    /// the output stays one object per line.
    pub fn header(&self) -> Vec<String> {
        match self.format {
            RenderFormat::Json => Vec::new(),
            RenderFormat::Text => {
                let rule = "─".repeat(TITLE.chars().count() + 2);
                vec![
                    rule.clone(),
                    format!(" {TITLE}"),
                    rule,
                    format!("({PLACEHOLDER} Enter to send, Ctrl-C to quit)"),
                ]
            }
        }
    }

    /// Lines for every message in `snapshot` not rendered yet.
    pub fn render_new(&mut self, snapshot: &Snapshot) -> Result<Vec<String>, AppError> {
        let fresh = snapshot.messages.get(self.rendered..).unwrap_or_default();
        let lines = fresh.iter().map(|m| self.line(m)).collect::<Result<Vec<_>, _>>()?;
        self.rendered = self.rendered.max(snapshot.messages.len());
        Ok(lines)
    }

    fn line(&self, message: &Message) -> Result<String, AppError> {
        match self.format {
            RenderFormat::Text => {
                let tag = match message.sender {
                    Sender::User => "you",
                    Sender::Bot => "bot",
                };
                Ok(format!("[{tag}] {}", message.text))
            }
            RenderFormat::Json => Ok(serde_json::to_string(message)?),
        }
    }
}
