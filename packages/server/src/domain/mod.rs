//! Domain layer for the message store and relay.
//!
//! Value objects defined here are shared with the client crate so both sides
//! validate room ids, sender names and message content the same way.

pub mod entity;
pub mod error;
pub mod repository;
pub mod value_object;

pub use entity::StoredMessage;
pub use error::{RepositoryError, ValueObjectError};
pub use repository::MessageRepository;
pub use value_object::{MessageContent, MessageKind, RoomId, SenderName, Timestamp};
