//! Stream Events
//!
//! Two layers of events reach the controller:
//!
//! - [`TransportEvent`]: what the transport observed (a message payload, a
//!   connection error, or the natural end of the stream)
//! - [`WireEvent`]: the JSON object carried in each message payload
//!
//! ```text
//! data: {"type":"thought","source":"WebDepartment","task_id":"t1","segment_id":3,"chunk":"..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Event observed by a transport for one stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// One message payload (the SSE `data` field)
    Message(String),
    /// The connection failed mid-stream
    Error(String),
    /// The stream ended normally
    Closed,
}

/// Wire event type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireEventType {
    /// A fragment of a department's reasoning
    Thought,
    /// A department finished reasoning
    ThoughtComplete,
    /// A fragment of the primary answer
    FinalOutput,
    /// The primary answer is complete
    FinalOutputComplete,
    /// The server finished the whole response
    Done,
    /// Any type this client does not know about
    #[serde(other)]
    Unknown,
}

/// One JSON event from the chat stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Event type
    #[serde(rename = "type")]
    pub kind: WireEventType,
    /// Text fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    /// Origin name (department) producing the fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Sub-task id, when several tasks share an origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// 1-based segment number; 0 is the placeholder signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<u32>,
}

impl WireEvent {
    /// Parse one message payload
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ProtocolParse`] if the payload is not a JSON
    /// object with a string `type` field and correctly typed optional fields.
    pub fn parse(payload: &str) -> Result<Self, ChatError> {
        Ok(serde_json::from_str(payload.trim())?)
    }

    /// Create an event of the given type with no fields set
    #[must_use]
    pub fn new(kind: WireEventType) -> Self {
        Self {
            kind,
            chunk: None,
            source: None,
            task_id: None,
            segment_id: None,
        }
    }

    /// A `thought` fragment
    pub fn thought(source: impl Into<String>, segment_id: u32, chunk: impl Into<String>) -> Self {
        Self {
            chunk: Some(chunk.into()),
            source: Some(source.into()),
            segment_id: Some(segment_id),
            ..Self::new(WireEventType::Thought)
        }
    }

    /// A `final_output` fragment
    pub fn final_output(segment_id: u32, chunk: impl Into<String>) -> Self {
        Self {
            chunk: Some(chunk.into()),
            segment_id: Some(segment_id),
            ..Self::new(WireEventType::FinalOutput)
        }
    }

    /// Attach a sub-task id
    #[must_use]
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Serialize back to a message payload
    #[must_use]
    pub fn to_payload(&self) -> String {
        // A struct of strings and integers always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}
