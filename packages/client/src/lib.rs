//! Nebula client core.
//!
//! Keeps one room's chat timeline consistent with the message history
//! service and the live relay, and negotiates a peer-to-peer call with the
//! other participants over the same signaling channel.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry point
pub use ui::run_client;
