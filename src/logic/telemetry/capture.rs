//! Window Capture
//!
//! Drains an event channel into a session-owned ring buffer until the
//! minimum window span is filled or the capture deadline passes. This is a
//! timeout, not a fixed sleep: a fast typist closes the window early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AuthError, AuthResult};

use super::buffer::TelemetryBuffer;
use super::event::TelemetryEvent;

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cooperative cancellation handle shared between the caller and a session.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// CAPTURE
// ============================================================================

/// How often to re-check cancellation while blocked on the channel.
const POLL_INTERVAL_MS: u64 = 50;

/// Capture one telemetry window from `rx`.
///
/// Returns as soon as the buffered window spans at least `min_window_ms`.
/// Fails with `Timeout` if the deadline passes first, or `Cancelled` if the
/// token fires. A disconnected sender ends capture early; the gate in
/// extraction decides whether what arrived is enough.
pub fn capture_window(
    rx: &Receiver<TelemetryEvent>,
    capacity: usize,
    min_window_ms: u64,
    timeout_ms: u64,
    cancel: &CancelToken,
) -> AuthResult<TelemetryBuffer> {
    let mut buffer = TelemetryBuffer::new(capacity);
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let min_span_us = min_window_ms * 1_000;

    loop {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        if buffer.span_us() >= min_span_us {
            log::debug!(
                "capture window closed: {} events over {}us ({} dropped)",
                buffer.len(),
                buffer.span_us(),
                buffer.dropped()
            );
            return Ok(buffer);
        }

        let now = Instant::now();
        if now >= deadline {
            if buffer.span_us() >= min_span_us {
                return Ok(buffer);
            }
            log::debug!(
                "capture timed out with {}us of signal (needed {}us)",
                buffer.span_us(),
                min_span_us
            );
            return Err(AuthError::Timeout);
        }

        let wait = (deadline - now).min(Duration::from_millis(POLL_INTERVAL_MS));
        match rx.recv_timeout(wait) {
            Ok(event) => {
                // Malformed sensor readings are dropped at the door.
                if event.payload.is_finite() {
                    buffer.push(event);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                // Producer is gone; hand back whatever arrived.
                if buffer.span_us() >= min_span_us {
                    return Ok(buffer);
                }
                return Err(AuthError::InsufficientSignal(format!(
                    "stream closed after {}us of signal",
                    buffer.span_us()
                )));
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_capture_closes_on_min_span() {
        let (tx, rx) = mpsc::channel();
        for i in 0..30u64 {
            tx.send(TelemetryEvent::key_press(i * 100_000, 80_000.0))
                .unwrap();
        }
        let buffer = capture_window(&rx, 64, 2_000, 5_000, &CancelToken::new()).unwrap();
        assert!(buffer.span_us() >= 2_000_000);
    }

    #[test]
    fn test_capture_timeout_without_signal() {
        let (_tx, rx) = mpsc::channel::<TelemetryEvent>();
        let result = capture_window(&rx, 64, 2_000, 100, &CancelToken::new());
        assert!(matches!(result, Err(AuthError::Timeout)));
    }

    #[test]
    fn test_capture_cancelled() {
        let (_tx, rx) = mpsc::channel::<TelemetryEvent>();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = capture_window(&rx, 64, 2_000, 5_000, &cancel);
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[test]
    fn test_capture_disconnected_with_enough_signal() {
        let (tx, rx) = mpsc::channel();
        tx.send(TelemetryEvent::key_press(0, 80_000.0)).unwrap();
        tx.send(TelemetryEvent::key_press(2_500_000, 85_000.0)).unwrap();
        drop(tx);
        let buffer = capture_window(&rx, 64, 2_000, 5_000, &CancelToken::new()).unwrap();
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_capture_drops_non_finite_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(TelemetryEvent::touch_press(0, f32::NAN, 0.1)).unwrap();
        tx.send(TelemetryEvent::key_press(0, 80_000.0)).unwrap();
        tx.send(TelemetryEvent::key_press(2_500_000, 85_000.0)).unwrap();
        drop(tx);
        let buffer = capture_window(&rx, 64, 2_000, 5_000, &CancelToken::new()).unwrap();
        assert_eq!(buffer.len(), 2);
    }
}
