//! Chat Session Controller
//!
//! Owns one chat session: the buffer registry, the live transport stream and
//! the session status. All mutation happens through `&mut self`, one event at
//! a time.
//!
//! # State Machine
//!
//! ```text
//!            submit()                 done / close
//!   Idle ─────────────► Processing ─────────────────► Done
//!    ▲                      │
//!    │ cancel()/reset()     │ transport error / bad payload
//!    └──────────────────────┴───────────────────────► Error
//! ```
//!
//! `submit()` is accepted from every state. Each submission, cancel and reset
//! starts a new [`Generation`]; events produced for an older generation are
//! dropped without effect.

use tokio::sync::mpsc::error::TryRecvError;

use crate::config::{ChatConfig, DEFAULT_FINAL_OUTPUT_KEY};
use crate::error::ChatError;
use crate::events::{TransportEvent, WireEvent, WireEventType};
use crate::messages::{ChatStatus, Generation, SessionSnapshot, SourceItem};
use crate::source_key::{SourceKey, SourceKeyResolver};
use crate::streaming::{BufferManagerConfig, SegmentOutcome, StreamBufferManager};
use crate::transport::{ChatRequest, ChatTransport, TransportStream};

/// What a dispatched event did to the session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Buffer or key state changed
    Applied,
    /// The session reached `Done`
    Finished,
    /// The session reached `Error`
    Failed,
    /// Valid for this generation but had no effect
    Ignored,
    /// Produced for an older generation and dropped
    StaleDropped,
}

/// Transport stream bound to the generation that opened it
struct ActiveStream {
    generation: Generation,
    stream: TransportStream,
}

/// Drives one chat session over a [`ChatTransport`]
pub struct ChatSessionController<T: ChatTransport> {
    /// Transport used to open streams
    transport: T,
    /// Per-source segment buffers
    manager: StreamBufferManager,
    /// Builds buffer keys from origin and task id
    resolver: SourceKeyResolver,
    /// Reserved key for the primary answer
    final_output_key: String,
    /// Session status
    status: ChatStatus,
    /// Live generation
    generation: Generation,
    /// Error that moved the session to `Error`
    last_error: Option<ChatError>,
    /// Primary answer text; survives cancel, cleared by reset
    final_answer: String,
    /// Sources that produced a thought, first-seen order
    active_keys: Vec<SourceKey>,
    /// Sources that signalled completion, first-seen order
    completed_keys: Vec<SourceKey>,
    /// Live transport stream, if any
    stream: Option<ActiveStream>,
}

impl<T: ChatTransport> ChatSessionController<T> {
    /// Create a controller with default settings
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            manager: StreamBufferManager::new(),
            resolver: SourceKeyResolver::new(),
            final_output_key: DEFAULT_FINAL_OUTPUT_KEY.to_string(),
            status: ChatStatus::Idle,
            generation: Generation::default(),
            last_error: None,
            final_answer: String::new(),
            active_keys: Vec::new(),
            completed_keys: Vec::new(),
            stream: None,
        }
    }

    /// Create a controller using the stream settings in `config`
    pub fn with_config(transport: T, config: &ChatConfig) -> Self {
        let mut controller = Self::new(transport);
        controller.manager = StreamBufferManager::with_config(BufferManagerConfig {
            max_segment_id: config.max_segment_id,
        });
        controller.final_output_key.clone_from(&config.final_output_key);
        controller
    }

    /// Replace the source key resolver
    #[must_use]
    pub fn with_resolver(mut self, resolver: SourceKeyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    // =========================================================================
    // Session control
    // =========================================================================

    /// Start streaming a response to `user_query`
    ///
    /// Supersedes whatever the session was doing: the previous stream is
    /// aborted and every buffer is discarded before the request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TransportSetup`] if the stream could not be
    /// opened. The session is then in `Error` with the same error recorded.
    pub async fn submit(
        &mut self,
        thread_id: impl Into<String>,
        user_query: impl Into<String>,
    ) -> Result<Generation, ChatError> {
        self.rearm();
        self.final_answer.clear();
        self.set_status(ChatStatus::Processing);

        let request = ChatRequest::new(thread_id, user_query);
        let generation = self.generation;
        tracing::info!(
            generation = %generation,
            transport = self.transport.name(),
            thread_id = %request.thread_id,
            "Submitting chat query"
        );

        match self.transport.open(&request).await {
            Ok(stream) => {
                self.stream = Some(ActiveStream { generation, stream });
                Ok(generation)
            }
            Err(err) => {
                self.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Abort the current stream and return to `Idle`
    ///
    /// The last answer text stays readable through [`Self::final_answer`].
    pub fn cancel(&mut self) {
        self.rearm();
        self.set_status(ChatStatus::Idle);
        tracing::info!(generation = %self.generation, "Chat session cancelled");
    }

    /// Cancel and forget the answer text, for a new conversation
    pub fn reset(&mut self) {
        self.cancel();
        self.final_answer.clear();
    }

    /// Discard one source's buffer and display item
    ///
    /// Returns `true` if anything was known about the source.
    pub fn retire_source(&mut self, key: &str) -> bool {
        let had_buffer = self.manager.delete_source(key).is_some();
        let before = self.active_keys.len() + self.completed_keys.len();
        self.active_keys.retain(|k| k.as_str() != key);
        self.completed_keys.retain(|k| k.as_str() != key);
        let after = self.active_keys.len() + self.completed_keys.len();

        tracing::debug!(key, "Retired source");
        had_buffer || before != after
    }

    // =========================================================================
    // Event handling
    // =========================================================================

    /// Apply one transport event produced for `generation`
    pub fn dispatch(&mut self, event: TransportEvent, generation: Generation) -> DispatchOutcome {
        if generation != self.generation {
            tracing::trace!(
                event_generation = %generation,
                current = %self.generation,
                "Dropped stale event"
            );
            return DispatchOutcome::StaleDropped;
        }

        match event {
            TransportEvent::Message(payload) => self.handle_payload(&payload),
            TransportEvent::Error(reason) => {
                self.release_stream();
                match self.status {
                    ChatStatus::Done => {
                        tracing::debug!(reason = %reason, "Ignored transport error after completion");
                        DispatchOutcome::Ignored
                    }
                    ChatStatus::Error => DispatchOutcome::Ignored,
                    ChatStatus::Idle | ChatStatus::Processing => {
                        self.fail(ChatError::Transport(reason));
                        DispatchOutcome::Failed
                    }
                }
            }
            TransportEvent::Closed => {
                self.release_stream();
                if self.status == ChatStatus::Processing {
                    self.set_status(ChatStatus::Done);
                    DispatchOutcome::Finished
                } else {
                    DispatchOutcome::Ignored
                }
            }
        }
    }

    fn handle_payload(&mut self, payload: &str) -> DispatchOutcome {
        if !matches!(self.status, ChatStatus::Processing | ChatStatus::Done) {
            return DispatchOutcome::Ignored;
        }

        let event = match WireEvent::parse(payload) {
            Ok(event) => event,
            Err(err) => return self.protocol_failure(err),
        };

        match event.kind {
            WireEventType::Thought => {
                let key = match self.event_key(&event) {
                    Ok(key) => key,
                    Err(err) => return self.protocol_failure(err),
                };
                let segment_id = event
                    .segment_id
                    .unwrap_or_else(|| self.manager.next_segment_id(key.as_str()));
                let chunk = event.chunk.unwrap_or_default();
                if let Err(err) =
                    apply_segment(&mut self.manager, key.as_str(), segment_id, chunk)
                {
                    return self.truncation_failure(err);
                }
                if !self.active_keys.contains(&key) {
                    tracing::debug!(key = %key, "New active source");
                    self.active_keys.push(key);
                }
                DispatchOutcome::Applied
            }
            WireEventType::ThoughtComplete => {
                let key = match self.event_key(&event) {
                    Ok(key) => key,
                    Err(err) => return self.protocol_failure(err),
                };
                self.manager.mark_complete(key.as_str());
                if !self.completed_keys.contains(&key) {
                    tracing::debug!(key = %key, "Source completed");
                    self.completed_keys.push(key);
                }
                DispatchOutcome::Applied
            }
            WireEventType::FinalOutput => {
                let key = self.final_output_key.as_str();
                let segment_id = event
                    .segment_id
                    .unwrap_or_else(|| self.manager.next_segment_id(key));
                let chunk = event.chunk.unwrap_or_default();
                if let Err(err) = apply_segment(&mut self.manager, key, segment_id, chunk) {
                    return self.truncation_failure(err);
                }
                self.final_answer = self.manager.display_text(&self.final_output_key);
                DispatchOutcome::Applied
            }
            WireEventType::FinalOutputComplete => {
                self.manager.mark_complete(&self.final_output_key);
                self.final_answer = self.manager.display_text(&self.final_output_key);
                self.finish()
            }
            WireEventType::Done => self.finish(),
            WireEventType::Unknown => {
                tracing::debug!(payload, "Ignored event of unknown type");
                DispatchOutcome::Ignored
            }
        }
    }

    /// Thought sources never share the answer's reserved key
    fn event_key(&self, event: &WireEvent) -> Result<SourceKey, ChatError> {
        let Some(source) = event.source.as_deref() else {
            return Err(ChatError::ProtocolParse(format!(
                "{:?} event without source",
                event.kind
            )));
        };
        let key = self.resolver.resolve(source, event.task_id.as_deref());
        if key.as_str() == self.final_output_key {
            return Err(ChatError::ProtocolParse(format!(
                "source {key} collides with the reserved answer key"
            )));
        }
        Ok(key)
    }

    fn finish(&mut self) -> DispatchOutcome {
        if self.status == ChatStatus::Processing {
            self.set_status(ChatStatus::Done);
            DispatchOutcome::Finished
        } else {
            DispatchOutcome::Ignored
        }
    }

    /// A dropped segment leaves a gap, so the text can never be complete
    fn truncation_failure(&mut self, err: ChatError) -> DispatchOutcome {
        self.release_stream();
        self.fail(err);
        DispatchOutcome::Failed
    }

    fn protocol_failure(&mut self, err: ChatError) -> DispatchOutcome {
        if self.status == ChatStatus::Done {
            tracing::warn!(error = %err, "Ignored malformed event after completion");
            return DispatchOutcome::Ignored;
        }
        self.release_stream();
        self.fail(err);
        DispatchOutcome::Failed
    }

    // =========================================================================
    // Driving the transport
    // =========================================================================

    /// Dispatch every event already queued on the live stream
    ///
    /// Never waits. Returns `true` if at least one event was processed.
    pub fn poll_transport(&mut self) -> bool {
        let mut processed = false;

        while let Some(active) = self.stream.as_mut() {
            let generation = active.generation;
            let event = match active.stream.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                // Producer vanished without a close marker
                Err(TryRecvError::Disconnected) => TransportEvent::Closed,
            };
            self.dispatch(event, generation);
            processed = true;
        }

        processed
    }

    /// Wait for the next event on the live stream and dispatch it
    ///
    /// Returns `None` when no stream is live.
    pub async fn next_event(&mut self) -> Option<DispatchOutcome> {
        let active = self.stream.as_mut()?;
        let generation = active.generation;
        let event = active.stream.recv().await.unwrap_or(TransportEvent::Closed);
        Some(self.dispatch(event, generation))
    }

    /// Dispatch events until the live stream is released
    pub async fn run_to_completion(&mut self) -> ChatStatus {
        while self.next_event().await.is_some() {}
        self.status
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Session status
    #[must_use]
    pub fn status(&self) -> ChatStatus {
        self.status
    }

    /// Live generation
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Error that moved the session to `Error`, if any
    #[must_use]
    pub fn last_error(&self) -> Option<&ChatError> {
        self.last_error.as_ref()
    }

    /// Current display text for a source (`""` when unknown)
    #[must_use]
    pub fn display_text(&self, key: &str) -> String {
        self.manager.display_text(key)
    }

    /// Primary answer text so far
    #[must_use]
    pub fn final_answer(&self) -> &str {
        &self.final_answer
    }

    /// Sources that produced a thought, first-seen order
    #[must_use]
    pub fn active_keys(&self) -> &[SourceKey] {
        &self.active_keys
    }

    /// Sources that signalled completion, first-seen order
    #[must_use]
    pub fn completed_keys(&self) -> &[SourceKey] {
        &self.completed_keys
    }

    /// Whether a transport stream is still held
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Buffer registry, read-only
    #[must_use]
    pub fn buffers(&self) -> &StreamBufferManager {
        &self.manager
    }

    /// The transport this controller opens streams with
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Capture everything a renderer needs
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let items = self
            .active_keys
            .iter()
            .map(|key| SourceItem {
                key: key.clone(),
                text: self.manager.display_text(key.as_str()),
                completed: self.completed_keys.contains(key),
            })
            .collect();

        SessionSnapshot {
            generation: self.generation,
            status: self.status,
            final_answer: self.final_answer.clone(),
            items,
            error: self.last_error.clone(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Abort the stream and start a clean generation
    fn rearm(&mut self) {
        self.release_stream();
        self.generation = self.generation.next();
        self.manager.reset();
        self.active_keys.clear();
        self.completed_keys.clear();
        self.last_error = None;
    }

    fn release_stream(&mut self) {
        if let Some(mut active) = self.stream.take() {
            active.stream.abort();
            tracing::debug!(generation = %active.generation, "Released chat stream");
        }
    }

    fn fail(&mut self, err: ChatError) {
        tracing::warn!(kind = err.kind(), error = %err, "Chat session failed");
        self.last_error = Some(err);
        self.set_status(ChatStatus::Error);
    }

    fn set_status(&mut self, status: ChatStatus) {
        if self.status != status {
            tracing::debug!(from = ?self.status, to = ?status, "Chat status changed");
        }
        self.status = status;
    }
}

/// Store one segment, failing if the buffer refused it
fn apply_segment(
    manager: &mut StreamBufferManager,
    key: &str,
    segment_id: u32,
    chunk: String,
) -> Result<(), ChatError> {
    match manager.apply(key, segment_id, chunk) {
        SegmentOutcome::Applied | SegmentOutcome::Duplicate => Ok(()),
        SegmentOutcome::Rejected => Err(ChatError::ProtocolParse(format!(
            "segment id {segment_id} for {key} exceeds limit {}",
            manager.config().max_segment_id
        ))),
    }
}

impl<T: ChatTransport> std::fmt::Debug for ChatSessionController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSessionController")
            .field("transport", &self.transport.name())
            .field("status", &self.status)
            .field("generation", &self.generation)
            .field("active_keys", &self.active_keys)
            .field("streaming", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}
