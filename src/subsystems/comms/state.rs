//! Shared state for the Comms subsystem — capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and are restricted to the typed
//! methods below. The [`ConversationManager`] itself stays private, so a
//! channel can only feed UI events in and read snapshots out.
//!
//! [`CommsState::report_event`] lets a running channel signal the comms
//! manager (shutdown, session start) without touching the conversation.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::conversation::{ConversationManager, Snapshot, SubmitOutcome, UiEvent};

// ── Events ────────────────────────────────────────────────────────────────────

/// Events a channel sends back to the comms subsystem manager.
#[derive(Debug, PartialEq, Eq)]
pub enum CommsEvent {
    /// Channel has stopped (clean exit or EOF).
    ChannelShutdown { channel_id: String },
    /// A new session started on the channel.
    SessionStarted { channel_id: String },
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared state passed as `Arc<CommsState>` to every channel task.
pub struct CommsState {
    conversation: Arc<ConversationManager>,
    event_tx: mpsc::Sender<CommsEvent>,
}

impl CommsState {
    pub fn new(conversation: Arc<ConversationManager>, event_tx: mpsc::Sender<CommsEvent>) -> Self {
        Self { conversation, event_tx }
    }

    /// Forward a raw UI event to the conversation.
    pub fn dispatch(&self, event: UiEvent) -> Option<SubmitOutcome> {
        self.conversation.dispatch(event)
    }

    /// Snapshot stream for rendering.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.conversation.subscribe()
    }

    /// Report an event to the comms subsystem manager.
    ///
    /// Non-blocking: drops the event and logs a warning if the manager is not
    /// keeping up (channel full) or has already exited (closed).
    pub fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("comms event dropped: {e}");
        }
    }
}
