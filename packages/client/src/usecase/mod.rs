//! Use case layer: the signaling channel and the session controller actor.

pub mod channel;
pub mod error;
pub mod event;
pub mod session;

pub use channel::{ChannelEvent, ChannelNotice, ChannelState, SignalingChannel};
pub use error::SessionError;
pub use event::{CallStatus, Intent, SessionSnapshot, SessionUpdate};
pub use session::{SessionConfig, SessionController, SessionDeps, SessionHandle};
