//! ui-chatbot — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at the configured level
//!   4. Mount the conversation and start the console channel
//!   5. Run until Ctrl-C or end of input, then tear the conversation down

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ui_chatbot::config;
use ui_chatbot::conversation::ConversationManager;
use ui_chatbot::error::AppError;
use ui_chatbot::logger;
use ui_chatbot::subsystems::comms;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // Optional file; a missing .env is not an error.
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::parse_level(&config.log_level)?;
    logger::init(&config.log_level)?;

    info!(
        app_name = %config.app_name,
        log_level = %config.log_level,
        reply_delay_ms = config.conversation.reply_delay.as_millis() as u64,
        "config loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(serve(&config));

    // The stdin reader blocks a worker thread until the next line arrives;
    // don't let it hold the process open after Ctrl-C.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn serve(config: &config::Config) -> Result<(), AppError> {
    let conversation = Arc::new(
        ConversationManager::new(&config.conversation)
            .map_err(|e| AppError::Config(e.to_string()))?,
    );

    let shutdown = CancellationToken::new();
    let handle = comms::start(config, conversation.clone(), shutdown.clone());

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received, shutting down");
                ctrl_c.cancel();
            }
            Err(e) => warn!("cannot listen for ctrl-c: {e}"),
        }
    });

    let result = handle.join().await;
    conversation.teardown().await;
    info!("conversation closed");
    result
}
