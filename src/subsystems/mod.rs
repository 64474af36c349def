//! Subsystems around the conversation core.

pub mod comms;
pub mod runtime;
