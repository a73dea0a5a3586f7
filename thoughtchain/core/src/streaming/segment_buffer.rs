//! Segment Buffer Implementation
//!
//! Reassembles one source's text from numbered fragments that may arrive out
//! of order, more than once, or with gaps that are filled in later.

use std::collections::HashSet;

/// Segment id reserved for the provisional "still working" signal
pub const PLACEHOLDER_SEGMENT_ID: u32 = 0;

/// Default upper bound on accepted segment ids
pub const DEFAULT_MAX_SEGMENT_ID: u32 = 65_536;

/// Hard ceiling for any configured segment limit
pub const MAX_SEGMENT_ID_LIMIT: u32 = 1 << 20;

/// Result of applying one segment to a buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Segment stored (may or may not have extended the displayed prefix)
    Applied,
    /// Segment id was already received; buffer untouched
    Duplicate,
    /// Segment id exceeds the buffer limit; buffer untouched
    Rejected,
}

/// Reassembly buffer for a single source
///
/// Index `i` of the segment vector holds the fragment for segment id `i + 1`.
/// The displayed text is always the contiguous prefix of received fragments,
/// so characters already shown never change.
#[derive(Clone, Debug)]
pub struct SegmentBuffer {
    /// Fragments by index, `None` until received
    segments: Vec<Option<String>>,
    /// Segment ids already applied (including the placeholder id)
    received: HashSet<u32>,
    /// Index of the last fragment in the contiguous prefix, `None` when nothing is displayable
    display_cursor: Option<usize>,
    /// Concatenation of fragments `0..=display_cursor`
    prefix: String,
    /// Whether a completion signal was observed
    complete: bool,
    /// Provisional text shown before any real content
    initial_placeholder: Option<String>,
    /// Set once real content or completion has been seen; the placeholder never comes back
    placeholder_retired: bool,
    /// Largest segment id this buffer will store
    max_segment_id: u32,
}

impl Default for SegmentBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentBuffer {
    /// Create an empty buffer with the default segment limit
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_segment_id(DEFAULT_MAX_SEGMENT_ID)
    }

    /// Create an empty buffer accepting ids up to `max_segment_id`
    ///
    /// The limit is clamped to [`MAX_SEGMENT_ID_LIMIT`].
    #[must_use]
    pub fn with_max_segment_id(max_segment_id: u32) -> Self {
        Self {
            segments: Vec::new(),
            received: HashSet::new(),
            display_cursor: None,
            prefix: String::new(),
            complete: false,
            initial_placeholder: None,
            placeholder_retired: false,
            max_segment_id: max_segment_id.min(MAX_SEGMENT_ID_LIMIT),
        }
    }

    /// Apply a segment and return the resulting display text
    pub fn add_segment(&mut self, segment_id: u32, content: impl Into<String>) -> String {
        self.apply(segment_id, content.into());
        self.display_text()
    }

    /// Apply a segment, reporting what happened to it
    ///
    /// Id 0 stores the placeholder unless real content has already been
    /// seen. Ids above the limit are rejected without being marked received.
    pub fn apply(&mut self, segment_id: u32, content: String) -> SegmentOutcome {
        if segment_id > self.max_segment_id {
            return SegmentOutcome::Rejected;
        }
        if !self.received.insert(segment_id) {
            return SegmentOutcome::Duplicate;
        }

        if segment_id == PLACEHOLDER_SEGMENT_ID {
            if !self.placeholder_retired {
                self.initial_placeholder = Some(content);
            }
            return SegmentOutcome::Applied;
        }

        self.retire_placeholder();

        let index = (segment_id - 1) as usize;
        if self.segments.len() <= index {
            self.segments.resize(index + 1, None);
        }
        self.segments[index] = Some(content);
        self.advance_cursor(index);

        SegmentOutcome::Applied
    }

    /// Extend the displayed prefix if `inserted` filled the next expected slot
    fn advance_cursor(&mut self, inserted: usize) {
        let next_expected = self.display_cursor.map_or(0, |c| c + 1);
        if inserted != next_expected {
            return;
        }

        let mut next = next_expected;
        while let Some(Some(fragment)) = self.segments.get(next) {
            self.prefix.push_str(fragment);
            self.display_cursor = Some(next);
            next += 1;
        }
    }

    fn retire_placeholder(&mut self) {
        self.initial_placeholder = None;
        self.placeholder_retired = true;
    }

    /// Current display text: the contiguous prefix, or the placeholder if nothing is displayable
    #[must_use]
    pub fn display_text(&self) -> String {
        self.display_str().to_string()
    }

    /// Borrowed form of [`Self::display_text`]
    #[must_use]
    pub fn display_str(&self) -> &str {
        if self.prefix.is_empty() {
            if let Some(placeholder) = &self.initial_placeholder {
                return placeholder;
            }
        }
        &self.prefix
    }

    /// Mark the source complete; clears any placeholder
    pub fn mark_complete(&mut self) {
        self.complete = true;
        self.retire_placeholder();
    }

    /// Whether a completion signal was observed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether the placeholder is currently set
    #[must_use]
    pub fn has_placeholder(&self) -> bool {
        self.initial_placeholder.is_some()
    }

    /// Number of distinct segment ids received, placeholder included
    #[must_use]
    pub fn received_count(&self) -> usize {
        self.received.len()
    }

    /// Largest real segment id received, 0 when none
    #[must_use]
    pub fn highest_id(&self) -> u32 {
        // segments.len() never exceeds max_segment_id, which is a u32
        self.segments.len() as u32
    }

    /// Id that follows the highest one received, for append-only producers
    #[must_use]
    pub fn next_segment_id(&self) -> u32 {
        self.highest_id().saturating_add(1)
    }

    /// Segments received but held back behind a gap
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let displayed = self.display_cursor.map_or(0, |c| c + 1);
        self.segments[displayed..].iter().flatten().count()
    }
}
