//! Stream Buffer Manager Implementation
//!
//! Keyed registry of segment buffers, one per logical source.

use std::collections::HashMap;

use super::segment_buffer::{SegmentBuffer, SegmentOutcome, DEFAULT_MAX_SEGMENT_ID};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the buffer manager
#[derive(Clone, Debug)]
pub struct BufferManagerConfig {
    /// Largest segment id any buffer will store; higher ids are rejected
    pub max_segment_id: u32,
}

impl Default for BufferManagerConfig {
    fn default() -> Self {
        Self {
            max_segment_id: DEFAULT_MAX_SEGMENT_ID,
        }
    }
}

/// Lifetime counters for a buffer manager
///
/// Survive [`StreamBufferManager::reset`]; useful for monitoring how noisy a
/// server's delivery is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Buffers created since construction
    pub buffers_created: u64,
    /// Segments stored
    pub segments_applied: u64,
    /// Segments ignored because their id was already received
    pub duplicates_ignored: u64,
    /// Segments dropped for exceeding the id limit
    pub segments_rejected: u64,
}

// ============================================================================
// Buffer Manager
// ============================================================================

/// Registry of per-source segment buffers
///
/// Buffers are created lazily on the first segment for a key and only
/// destroyed by [`Self::reset`] or [`Self::delete_source`].
#[derive(Debug, Default)]
pub struct StreamBufferManager {
    /// Buffers by source key
    buffers: HashMap<String, SegmentBuffer>,
    /// Configuration
    config: BufferManagerConfig,
    /// Lifetime statistics
    stats: BufferStats,
}

impl StreamBufferManager {
    /// Create a manager with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BufferManagerConfig::default())
    }

    /// Create a manager with custom configuration
    #[must_use]
    pub fn with_config(config: BufferManagerConfig) -> Self {
        Self {
            buffers: HashMap::new(),
            config,
            stats: BufferStats::default(),
        }
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &BufferManagerConfig {
        &self.config
    }

    /// Add a segment to the buffer for `key`, creating it if needed
    ///
    /// Returns the buffer's display text after the segment is applied.
    pub fn add_segment(&mut self, key: &str, segment_id: u32, content: impl Into<String>) -> String {
        self.apply(key, segment_id, content);
        self.display_text(key)
    }

    /// Add a segment to the buffer for `key`, reporting what happened to it
    ///
    /// A rejected segment still creates the buffer, so the key is known.
    pub fn apply(
        &mut self,
        key: &str,
        segment_id: u32,
        content: impl Into<String>,
    ) -> SegmentOutcome {
        let max_segment_id = self.config.max_segment_id;
        let buffer = self.buffers.entry(key.to_string()).or_insert_with(|| {
            self.stats.buffers_created += 1;
            tracing::trace!(key, "Created segment buffer");
            SegmentBuffer::with_max_segment_id(max_segment_id)
        });

        let outcome = buffer.apply(segment_id, content.into());
        match outcome {
            SegmentOutcome::Applied => self.stats.segments_applied += 1,
            SegmentOutcome::Duplicate => {
                self.stats.duplicates_ignored += 1;
                tracing::trace!(key, segment_id, "Ignored duplicate segment");
            }
            SegmentOutcome::Rejected => {
                self.stats.segments_rejected += 1;
                tracing::warn!(
                    key,
                    segment_id,
                    max_segment_id,
                    "Rejected segment beyond buffer limit"
                );
            }
        }
        outcome
    }

    /// Id following the highest one received for `key` (1 for an unknown key)
    #[must_use]
    pub fn next_segment_id(&self, key: &str) -> u32 {
        self.buffers
            .get(key)
            .map_or(1, SegmentBuffer::next_segment_id)
    }

    /// Mark a source complete; no-op for an unknown key
    pub fn mark_complete(&mut self, key: &str) {
        if let Some(buffer) = self.buffers.get_mut(key) {
            buffer.mark_complete();
        }
    }

    /// Current display text for `key`, empty for an unknown key
    #[must_use]
    pub fn display_text(&self, key: &str) -> String {
        self.buffers
            .get(key)
            .map(SegmentBuffer::display_text)
            .unwrap_or_default()
    }

    /// Whether the source for `key` has been marked complete
    #[must_use]
    pub fn is_complete(&self, key: &str) -> bool {
        self.buffers.get(key).is_some_and(SegmentBuffer::is_complete)
    }

    /// Read-only access to a buffer
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SegmentBuffer> {
        self.buffers.get(key)
    }

    /// Whether a buffer exists for `key`
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.buffers.contains_key(key)
    }

    /// Keys of all live buffers, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Number of live buffers
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether there are no live buffers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Discard every buffer (session boundary)
    pub fn reset(&mut self) {
        if !self.buffers.is_empty() {
            tracing::debug!(buffers = self.buffers.len(), "Resetting segment buffers");
        }
        self.buffers.clear();
    }

    /// Discard the buffer for one source
    ///
    /// Returns the buffer if it existed.
    pub fn delete_source(&mut self, key: &str) -> Option<SegmentBuffer> {
        self.buffers.remove(key)
    }

    /// Lifetime statistics
    #[must_use]
    pub fn stats(&self) -> BufferStats {
        self.stats
    }
}

// ============================================================================
// Tests
// ============================================================================
