//! ui-chatbot — a console chat simulator.
//!
//! The [`conversation`] module owns the transcript and input buffer and
//! schedules a canned bot reply after every accepted message. Render
//! surfaces live under [`subsystems::comms`].

pub mod config;
pub mod conversation;
pub mod error;
pub mod logger;
pub mod reply;
pub mod subsystems;
