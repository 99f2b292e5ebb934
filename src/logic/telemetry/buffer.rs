//! Telemetry Ring Buffer
//!
//! Fixed-capacity buffer of raw events owned by a single capture session.
//! When full, the oldest event is dropped so the window always holds the
//! most recent interaction. Cleared (and its contents gone for good) once
//! feature extraction has consumed the window.

use std::collections::VecDeque;

use super::event::{EventKind, TelemetryEvent};

/// Fixed-capacity ring buffer of interaction events
#[derive(Debug)]
pub struct TelemetryBuffer {
    events: VecDeque<TelemetryEvent>,
    capacity: usize,
    dropped: u64,
    kind_counts: [usize; 4],
}

impl TelemetryBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "telemetry buffer capacity must be positive");
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
            kind_counts: [0; 4],
        }
    }

    /// Append an event, evicting the oldest when at capacity.
    pub fn push(&mut self, event: TelemetryEvent) {
        if self.events.len() == self.capacity {
            if let Some(old) = self.events.pop_front() {
                self.kind_counts[old.kind().index()] -= 1;
                self.dropped += 1;
            }
        }
        self.kind_counts[event.kind().index()] += 1;
        self.events.push_back(event);
    }

    /// Events in arrival order.
    pub fn window(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.events.iter()
    }

    /// Snapshot of the window as a contiguous slice.
    pub fn to_vec(&self) -> Vec<TelemetryEvent> {
        self.events.iter().copied().collect()
    }

    /// Time covered by the window in microseconds (0 if < 2 events).
    pub fn span_us(&self) -> u64 {
        match (self.events.front(), self.events.back()) {
            (Some(first), Some(last)) => last.timestamp_us.saturating_sub(first.timestamp_us),
            _ => 0,
        }
    }

    pub fn kind_count(&self, kind: EventKind) -> usize {
        self.kind_counts[kind.index()]
    }

    /// Number of distinct kinds present (multi-modal gate input).
    pub fn distinct_kinds(&self) -> usize {
        self.kind_counts.iter().filter(|&&c| c > 0).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.kind_counts = [0; 4];
    }
}

// ============================================================================
// TESTS
// ============================================================================
