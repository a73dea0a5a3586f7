//! Session Messages
//!
//! Read-only types the controller hands to rendering collaborators. A
//! renderer never mutates session state; it reads these and decides when to
//! redraw.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::source_key::SourceKey;

/// Session status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    /// No stream running (initial, or after cancel/reset)
    #[default]
    Idle,
    /// A stream is being consumed
    Processing,
    /// The server signalled completion or the stream closed normally
    Done,
    /// The stream failed; partial text is retained
    Error,
}

impl ChatStatus {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Processing => "Processing...",
            Self::Done => "Done",
            Self::Error => "Error",
        }
    }

    /// Whether the current generation has finished, successfully or not
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Streaming attempt counter
///
/// Incremented on every submission, cancel and reset. Events carry the
/// generation they were produced for; anything older than the current
/// generation is ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation after this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// One source's display item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    /// Source key (origin, optionally `origin::task_id`)
    pub key: SourceKey,
    /// Current display text (may be empty while waiting for the first segment)
    pub text: String,
    /// Whether the source signalled completion
    pub completed: bool,
}

/// Everything a renderer needs, captured at one point in time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Live generation
    pub generation: Generation,
    /// Session status
    pub status: ChatStatus,
    /// Primary answer text so far
    pub final_answer: String,
    /// Active sources in first-seen order
    pub items: Vec<SourceItem>,
    /// Last error, if the session failed
    pub error: Option<ChatError>,
}

impl SessionSnapshot {
    /// Look up an item by key
    #[must_use]
    pub fn item(&self, key: &str) -> Option<&SourceItem> {
        self.items.iter().find(|item| item.key.as_str() == key)
    }
}
