//! Comms subsystem — render surfaces that display the conversation and feed
//! UI events back into it.
//!
//! Each channel implements [`Component`] and is spawned by [`start`] via
//! [`spawn_components`]. Channels capture their shared [`Arc<CommsState>`]
//! at construction time.
//!
//! An intra-subsystem [`mpsc`] channel lets running channels signal the
//! comms manager (lifecycle events). It is drained in a short-lived task that
//! ends when every channel sender is dropped.

pub mod render;
mod state;
#[cfg(feature = "channel-pty")]
pub mod pty;

pub use state::{CommsEvent, CommsState};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::conversation::ConversationManager;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

/// Spawn all configured channels and return a [`SubsystemHandle`].
///
/// Synchronous: returns as soon as the tasks are spawned. The handle
/// resolves when every channel has exited.
pub fn start(
    config: &Config,
    conversation: Arc<ConversationManager>,
    shutdown: CancellationToken,
) -> SubsystemHandle {
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(32);
    let state = Arc::new(CommsState::new(conversation, event_tx));

    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-pty")]
    {
        if config.comms_pty_should_load() {
            info!(format = ?config.comms.pty.format, "loading pty channel");
            components.push(Box::new(pty::PtyChannel::new(
                "pty0",
                state.clone(),
                config.comms.pty.format,
            )));
        }
    }

    if components.is_empty() {
        info!("no comms channels configured");
    }

    // `state` holds the last sender once every channel is spawned; drop it so
    // the drain task ends with the channels.
    drop(state);

    tokio::spawn(async move {
        let mut rx = event_rx;
        while let Some(event) = rx.recv().await {
            match event {
                CommsEvent::ChannelShutdown { ref channel_id } => {
                    debug!(channel_id, "channel reported shutdown");
                }
                CommsEvent::SessionStarted { ref channel_id } => {
                    debug!(channel_id, "channel session started");
                }
            }
        }
    });

    spawn_components(components, shutdown)
}
