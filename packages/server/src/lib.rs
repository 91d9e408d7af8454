//! Reference relay and message store for Nebula.
//!
//! Provides the two external collaborators the Nebula client talks to:
//! the per-room signaling relay (`/ws/{room_id}`) and the message history
//! service (`/messages`).

pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry points
pub use ui::{run, serve};
