//! PTY (console) comms channel — the render surface for a terminal.
//!
//! Reads lines from stdin and feeds each one to the conversation as a
//! text-change followed by an Enter key press. Prints every message as it is
//! appended to the transcript, including bot replies that arrive later.
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C), or until stdin is
//! closed and every pending reply has been printed.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RenderFormat;
use crate::conversation::{Key, UiEvent};
use crate::error::AppError;
use crate::subsystems::runtime::{Component, ComponentFuture};
use super::render::Renderer;
use super::state::{CommsEvent, CommsState};

// ── PtyChannel ───────────────────────────────────────────────────────────────

pub struct PtyChannel {
    channel_id: String,
    state: Arc<CommsState>,
    format: RenderFormat,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>, format: RenderFormat) -> Self {
        Self { channel_id: channel_id.into(), state, format }
    }
}

impl Component for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(async move {
            let input = BufReader::new(tokio::io::stdin());
            let mut output = tokio::io::stdout();
            run_console(self.channel_id, self.state, self.format, input, &mut output, shutdown).await
        })
    }
}

// ── run_console ──────────────────────────────────────────────────────────────

/// Drive one console session over arbitrary line input and byte output.
pub async fn run_console<R, W>(
    channel_id: String,
    state: Arc<CommsState>,
    format: RenderFormat,
    input: R,
    output: &mut W,
    shutdown: CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(%channel_id, "pty channel started");

    let mut renderer = Renderer::new(format);
    let mut snapshots = state.subscribe();

    write_lines(output, &renderer.header()).await?;
    let initial = snapshots.borrow_and_update().clone();
    write_lines(output, &renderer.render_new(&initial)?).await?;
    state.report_event(CommsEvent::SessionStarted { channel_id: channel_id.clone() });

    let mut lines = input.lines();
    let mut input_open = true;

    loop {
        let awaiting = snapshots.borrow().is_awaiting_reply();
        if !input_open && !awaiting {
            debug!(%channel_id, "input closed and no reply pending");
            break;
        }

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(%channel_id, "pty channel shutting down");
                break;
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!(%channel_id, "conversation dropped");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                write_lines(output, &renderer.render_new(&snapshot)?).await?;
            }

            line = lines.next_line(), if input_open => {
                match line {
                    Err(e) => {
                        warn!(%channel_id, "pty read error: {e}");
                        input_open = false;
                    }
                    Ok(None) => {
                        info!(%channel_id, "pty input closed");
                        input_open = false;
                    }
                    Ok(Some(text)) => {
                        debug!(%channel_id, len = text.len(), "pty received line");
                        state.dispatch(UiEvent::TextChanged(text));
                        state.dispatch(UiEvent::KeyPressed(Key::Enter));
                    }
                }
            }
        }
    }

    // Anything appended between the last wake-up and exit.
    let last = snapshots.borrow().clone();
    write_lines(output, &renderer.render_new(&last)?).await?;

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}

async fn write_lines<W: AsyncWrite + Unpin>(output: &mut W, lines: &[String]) -> Result<(), AppError> {
    if lines.is_empty() {
        return Ok(());
    }
    for line in lines {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.flush().await?;
    Ok(())
}
