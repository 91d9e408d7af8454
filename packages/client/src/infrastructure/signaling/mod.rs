//! Relay connectors.

pub mod websocket;

pub use websocket::WsConnector;
