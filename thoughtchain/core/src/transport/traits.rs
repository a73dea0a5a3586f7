//! Transport Traits
//!
//! A transport opens one streaming chat request and forwards what it observes
//! as [`TransportEvent`]s. The controller never sees bytes or HTTP; it only
//! reads events from a [`TransportStream`] and aborts the stream when the
//! session moves on.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::ChatError;
use crate::events::TransportEvent;

/// Body of a chat request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    /// Conversation thread the query belongs to
    pub thread_id: String,
    /// The user's question
    pub user_query: String,
}

impl ChatRequest {
    /// Create a new request
    pub fn new(thread_id: impl Into<String>, user_query: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_query: user_query.into(),
        }
    }
}

/// Receiving end of one opened stream
///
/// Dropping the stream aborts the task feeding it, if any.
#[derive(Debug)]
pub struct TransportStream {
    receiver: mpsc::Receiver<TransportEvent>,
    task: Option<AbortHandle>,
}

impl TransportStream {
    /// Wrap a receiver with no background task
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<TransportEvent>) -> Self {
        Self {
            receiver,
            task: None,
        }
    }

    /// Create a bounded channel and the stream reading from it
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<TransportEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// Attach the task producing this stream's events
    #[must_use]
    pub fn with_task(mut self, task: AbortHandle) -> Self {
        self.task = Some(task);
        self
    }

    /// Wait for the next event
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Result<TransportEvent, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Stop the producing task and refuse further events
    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.receiver.close();
    }
}

impl Drop for TransportStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Chat transport trait
///
/// Implement this trait to stream chat responses over a different wire.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Open a stream for `request`
    ///
    /// Resolves once the server has accepted the request. Events then arrive
    /// on the returned stream until it yields [`TransportEvent::Closed`] or
    /// [`TransportEvent::Error`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TransportSetup`] if the stream could not be opened.
    async fn open(&self, request: &ChatRequest) -> Result<TransportStream, ChatError>;
}
