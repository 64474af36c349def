//! Conversation model — messages, ids, the ordered transcript, and the
//! UI events a render surface feeds back in.
//!
//! The stateful part (input buffer, deferred replies, cancellation) lives in
//! [`manager::ConversationManager`]; this module holds the plain data types.

pub mod manager;

pub use manager::{ConversationManager, SubmitOutcome};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Seed greeting shown before any interaction.
pub const DEFAULT_GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// The fixed bot reply.
pub const DEFAULT_REPLY_TEXT: &str =
    "I'm a UI-only chatbot, so I can't actually respond meaningfully, but your message was received!";

/// Latency between a user message and its bot reply.
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1000);

// ── Message ──────────────────────────────────────────────────────────────────

/// Unique message id within one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    /// Stored exactly as typed; only the acceptance check trims.
    pub text: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

// ── Blank input ──────────────────────────────────────────────────────────────

/// `true` if `text` is empty or made only of whitespace as the browser's
/// `String.prototype.trim` sees it: WhiteSpace (tab, VT, FF, space, NBSP,
/// BOM, every `Zs` character) and LineTerminator (LF, CR, LS, PS).
///
/// This differs from [`char::is_whitespace`]: U+FEFF counts as blank here,
/// U+0085 does not.
pub fn is_blank(text: &str) -> bool {
    text.chars().all(is_trim_whitespace)
}

fn is_trim_whitespace(c: char) -> bool {
    matches!(
        c,
        '\u{0009}' | '\u{000B}' | '\u{000C}' | '\u{0020}' | '\u{00A0}' | '\u{FEFF}'
            | '\u{1680}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}'
            | '\u{000A}' | '\u{000D}' | '\u{2028}' | '\u{2029}'
    )
}

// ── IdGenerator ──────────────────────────────────────────────────────────────

/// Monotonic id source. Ids start at 1 and never repeat for the lifetime of
/// the generator, however fast messages arrive.
#[derive(Debug)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId(self.next);
        self.next += 1;
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Conversation ─────────────────────────────────────────────────────────────

/// Ordered transcript, oldest first. Never empty: it always starts with the
/// seed greeting.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a conversation holding only the seed bot greeting.
    pub fn seeded(ids: &mut IdGenerator, greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![Message {
                id: ids.next_id(),
                text: greeting.into(),
                sender: Sender::Bot,
                created_at: Utc::now(),
            }],
        }
    }

    /// Append a message with a fresh id and return that id.
    pub fn push(&mut self, ids: &mut IdGenerator, sender: Sender, text: String) -> MessageId {
        let id = ids.next_id();
        self.messages.push(Message { id, text, sender, created_at: Utc::now() });
        id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> &Message {
        // Seeded on construction and append-only.
        &self.messages[self.messages.len() - 1]
    }
}

// ── Snapshot ─────────────────────────────────────────────────────────────────

/// Immutable view of manager state handed to the render surface after every
/// change. The transcript is shared, so publishing a buffer edit does not
/// copy it.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub messages: Arc<[Message]>,
    pub input_buffer: String,
    pub pending_replies: usize,
}

impl Snapshot {
    pub fn is_awaiting_reply(&self) -> bool {
        self.pending_replies > 0
    }
}

// ── UI events ────────────────────────────────────────────────────────────────

/// Key identifier reported by the render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// The commit key.
    Enter,
    Other(String),
}

impl Key {
    /// Map a DOM-style key name (`"Enter"`, `"a"`, `"Escape"`, …) to a [`Key`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "Enter" => Self::Enter,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_commit(&self) -> bool {
        matches!(self, Self::Enter)
    }
}

/// Raw events emitted by a render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    TextChanged(String),
    KeyPressed(Key),
    SendClicked,
}
