//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("comms error: {0}")]
    Comms(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("render error: {0}")]
    Render(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
