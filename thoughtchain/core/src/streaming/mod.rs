//! Segment Reassembly for Interleaved Sources
//!
//! The server streams fragments of several independent texts ("sources") over
//! one connection. Each fragment carries a 1-based segment id; fragments may be
//! delivered out of order or more than once. This module rebuilds each
//! source's text so that what is displayed only ever grows.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    StreamBufferManager                        │
//! │   ┌──────────────────┐  ┌──────────────────┐                  │
//! │   │  SegmentBuffer   │  │  SegmentBuffer   │  ...             │
//! │   │  key: "Supervisor"│  │  key: "Web::t-42"│                  │
//! │   │  [A][B][ ][D]    │  │  [x][y]          │                  │
//! │   │   ^cursor        │  │      ^cursor     │                  │
//! │   └──────────────────┘  └──────────────────┘                  │
//! │                                                              │
//! │   add_segment(key, id, chunk) ──► display text (prefix)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **Prefix-monotonic**: a character, once displayed, never changes
//! - **Idempotent**: re-delivering a segment id has no effect
//! - **Isolated**: buffers never observe each other's segments
//!
//! # Example
//!
//! ```ignore
//! use thoughtchain_core::streaming::StreamBufferManager;
//!
//! let mut manager = StreamBufferManager::new();
//! assert_eq!(manager.add_segment("s", 2, "B"), "");
//! assert_eq!(manager.add_segment("s", 1, "A"), "AB");
//! ```

mod buffer_manager;
mod segment_buffer;

pub use buffer_manager::{BufferManagerConfig, BufferStats, StreamBufferManager};
pub use segment_buffer::{
    SegmentBuffer, SegmentOutcome, DEFAULT_MAX_SEGMENT_ID, MAX_SEGMENT_ID_LIMIT,
    PLACEHOLDER_SEGMENT_ID,
};
