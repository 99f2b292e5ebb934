//! Telemetry - Raw interaction capture
//!
//! - `event` - Immutable interaction events (keystroke, touch, motion)
//! - `buffer` - Session-owned fixed-capacity ring buffer
//! - `capture` - Timeout-bounded window capture with cancellation

pub mod buffer;
pub mod capture;
pub mod event;

pub use buffer::TelemetryBuffer;
pub use capture::{capture_window, CancelToken};
pub use event::{EventKind, EventPayload, TelemetryEvent};
