//! Shared utilities for the Nebula server and client.

pub mod logger;
pub mod time;
