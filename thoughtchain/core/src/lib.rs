//! Thoughtchain Core - Segmented Chat-Stream Reassembly
//!
//! A chat server answers one query with a single event stream that interleaves
//! the reasoning of several departments ("thoughts") with the primary answer.
//! Fragments arrive tagged with a source and a segment id, possibly out of
//! order or duplicated. This crate rebuilds every source's text so that what a
//! surface displays only ever grows, and runs the chat session around it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Renderer / CLI / Surface                      │
//! │        submit() cancel() reset()          snapshot() getters      │
//! └───────────────┬───────────────────────────────────▲──────────────┘
//!                 │                                   │
//! ┌───────────────▼───────────────────────────────────┴──────────────┐
//! │                     ChatSessionController                         │
//! │  ┌────────────┐  ┌──────────────────┐  ┌────────────────────────┐ │
//! │  │ Generation │  │ SourceKeyResolver│  │  StreamBufferManager   │ │
//! │  │  + status  │  │ origin::task_id  │  │  key → SegmentBuffer   │ │
//! │  └────────────┘  └──────────────────┘  └────────────────────────┘ │
//! └───────────────▲──────────────────────────────────────────────────┘
//!                 │ TransportEvent (Message / Error / Closed)
//! ┌───────────────┴──────────────────────────────────────────────────┐
//! │             ChatTransport (SseTransport: POST + SSE)              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use thoughtchain_core::{load_config, ChatSessionController, SseTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let transport = SseTransport::from_config(&config)?;
//!     let mut controller = ChatSessionController::with_config(transport, &config);
//!
//!     controller.submit("thread-1", "What is the capital of France?").await?;
//!     while controller.next_event().await.is_some() {
//!         let snapshot = controller.snapshot();
//!         // Render snapshot.items and snapshot.final_answer
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`streaming`]: Segment buffers and the per-source registry
//! - [`source_key`]: Buffer keys from origin and sub-task id
//! - [`events`]: Transport events and the JSON wire event
//! - [`transport`]: Transport trait and the SSE implementation
//! - [`controller`]: The chat session state machine
//! - [`messages`]: Status, generation and snapshot types for renderers
//! - [`config`]: Layered configuration (file, environment, CLI)
//! - [`error`]: Session error taxonomy

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod messages;
pub mod source_key;
pub mod streaming;
pub mod transport;

// Re-exports for convenience
pub use controller::{ChatSessionController, DispatchOutcome};
pub use error::ChatError;
pub use events::{TransportEvent, WireEvent, WireEventType};
pub use messages::{ChatStatus, Generation, SessionSnapshot, SourceItem};
pub use source_key::{SourceKey, SourceKeyResolver, DEFAULT_SEPARATOR};
pub use transport::{ChatRequest, ChatTransport, SseTransport, TransportStream};

// Streaming exports
pub use streaming::{
    BufferManagerConfig, BufferStats, SegmentBuffer, SegmentOutcome, StreamBufferManager,
    DEFAULT_MAX_SEGMENT_ID, MAX_SEGMENT_ID_LIMIT, PLACEHOLDER_SEGMENT_ID,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ChatConfig, ChatToml, ConfigError,
    ConfigOverrides, ConfigSource,
};
