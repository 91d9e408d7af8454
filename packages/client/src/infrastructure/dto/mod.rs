//! Data transfer objects and their conversion to domain types.

pub mod message;
pub mod websocket;
