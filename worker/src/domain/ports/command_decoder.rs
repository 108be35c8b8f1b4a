//! Driving port turning raw delivery bodies into commands.

use crate::domain::{Command, CommandKind};

use super::define_port_error;

define_port_error! {
    /// Errors raised while decoding a delivery body.
    pub enum DecodeError {
        /// Body is not a well-formed payload for the queue's command kind.
        Malformed { kind: CommandKind, message: String } =>
            "failed to decode {kind} payload: {message}",
    }
}

/// Port decoding a delivery body into the command its queue carries.
///
/// The queue, not the body, determines which command kind is expected.
#[cfg_attr(test, mockall::automock)]
pub trait CommandDecoder: Send + Sync {
    /// Decode `body` as a command of `kind`.
    fn decode(&self, kind: CommandKind, body: &[u8]) -> Result<Command, DecodeError>;
}
