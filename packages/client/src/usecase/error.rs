//! Use case layer error definitions.

use thiserror::Error;

use crate::domain::ValueObjectError;

/// Reasons an intent was refused. Reported to the user as notices; none of
/// them ends the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Join a room first")]
    NoActiveRoom,

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValueObjectError),

    #[error("A call is already in progress")]
    CallInProgress,

    #[error("No call to end")]
    NoCall,

    #[error("Session has shut down")]
    Closed,
}
