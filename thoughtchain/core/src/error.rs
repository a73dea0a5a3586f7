//! Error Types
//!
//! Every user-visible failure moves the session to `Error` and keeps whatever
//! text was already reassembled. Nothing here is retried automatically; the
//! only way forward is a new submission.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a chat session
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatError {
    /// The stream could not be opened (connect failure, bad status, wrong content type)
    #[error("failed to set up chat stream: {0}")]
    TransportSetup(String),

    /// The stream failed after it was opened
    #[error("chat stream connection error: {0}")]
    Transport(String),

    /// An event payload could not be parsed
    #[error("error parsing stream event: {0}")]
    ProtocolParse(String),
}

impl ChatError {
    /// Short machine-readable name for the error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransportSetup(_) => "transport_setup",
            Self::Transport(_) => "transport",
            Self::ProtocolParse(_) => "protocol_parse",
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::ProtocolParse(err.to_string())
    }
}
