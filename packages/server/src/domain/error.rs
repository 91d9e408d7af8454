//! Domain layer error definitions.

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// RoomId validation error
    #[error("RoomId cannot be empty")]
    RoomIdEmpty,

    /// RoomId too long error
    #[error("RoomId cannot exceed {max} characters (got {actual})")]
    RoomIdTooLong { max: usize, actual: usize },

    /// RoomId contains a character that cannot appear in a URL path segment
    #[error("RoomId contains an invalid character (got: {0})")]
    RoomIdInvalidCharacter(String),

    /// SenderName validation error
    #[error("SenderName cannot be empty")]
    SenderNameEmpty,

    /// SenderName too long error
    #[error("SenderName cannot exceed {max} characters (got {actual})")]
    SenderNameTooLong { max: usize, actual: usize },

    /// MessageContent validation error
    #[error("MessageContent cannot be empty")]
    MessageContentEmpty,

    /// MessageContent too long error
    #[error("MessageContent cannot exceed {max} characters (got {actual})")]
    MessageContentTooLong { max: usize, actual: usize },

    /// Unknown message kind
    #[error("Unsupported message kind: {0}")]
    UnsupportedMessageKind(String),
}

/// Errors returned by message repositories
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Backing storage is unavailable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
