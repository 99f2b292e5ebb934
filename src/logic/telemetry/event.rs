//! Interaction Event Types
//!
//! Immutable, monotonically-timestamped raw interaction events.
//! Events live only inside one capture window and are discarded after
//! feature extraction consumes them. They are never persisted.

// ============================================================================
// EVENT KINDS
// ============================================================================

/// Categories of interaction events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Key pressed and released (keystroke dynamics)
    KeyPress,
    /// Touch point moved (swipe trajectory)
    TouchMove,
    /// Touch with pressure reading
    TouchPress,
    /// Accelerometer sample (device micro-motion)
    MotionSample,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::KeyPress => "key_press",
            EventKind::TouchMove => "touch_move",
            EventKind::TouchPress => "touch_press",
            EventKind::MotionSample => "motion_sample",
        }
    }

    /// All kinds, in a fixed order used for per-kind accounting.
    pub const ALL: [EventKind; 4] = [
        EventKind::KeyPress,
        EventKind::TouchMove,
        EventKind::TouchPress,
        EventKind::MotionSample,
    ];

    pub fn index(&self) -> usize {
        match self {
            EventKind::KeyPress => 0,
            EventKind::TouchMove => 1,
            EventKind::TouchPress => 2,
            EventKind::MotionSample => 3,
        }
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// Kind-specific numeric payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventPayload {
    /// Dwell time of the keystroke in microseconds
    KeyPress { dwell_us: f32 },
    /// Touch position (normalized screen coords) and instantaneous velocity
    TouchMove { x: f32, y: f32, velocity: f32 },
    /// Touch pressure (normalized) and contact area
    TouchPress { pressure: f32, area: f32 },
    /// Accelerometer axes (m/s^2, gravity removed)
    MotionSample { ax: f32, ay: f32, az: f32 },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::KeyPress { .. } => EventKind::KeyPress,
            EventPayload::TouchMove { .. } => EventKind::TouchMove,
            EventPayload::TouchPress { .. } => EventKind::TouchPress,
            EventPayload::MotionSample { .. } => EventKind::MotionSample,
        }
    }

    /// All payload fields are finite (sensor glitches show up as NaN/Inf).
    pub fn is_finite(&self) -> bool {
        match *self {
            EventPayload::KeyPress { dwell_us } => dwell_us.is_finite(),
            EventPayload::TouchMove { x, y, velocity } => {
                x.is_finite() && y.is_finite() && velocity.is_finite()
            }
            EventPayload::TouchPress { pressure, area } => {
                pressure.is_finite() && area.is_finite()
            }
            EventPayload::MotionSample { ax, ay, az } => {
                ax.is_finite() && ay.is_finite() && az.is_finite()
            }
        }
    }
}

// ============================================================================
// TELEMETRY EVENT
// ============================================================================

/// Immutable raw interaction event
///
/// `timestamp_us` is monotonic microseconds from the capture clock, not wall
/// time. Wall time never touches raw telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryEvent {
    pub timestamp_us: u64,
    pub payload: EventPayload,
}

impl TelemetryEvent {
    pub fn new(timestamp_us: u64, payload: EventPayload) -> Self {
        Self {
            timestamp_us,
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    // Convenience constructors

    pub fn key_press(timestamp_us: u64, dwell_us: f32) -> Self {
        Self::new(timestamp_us, EventPayload::KeyPress { dwell_us })
    }

    pub fn touch_move(timestamp_us: u64, x: f32, y: f32, velocity: f32) -> Self {
        Self::new(timestamp_us, EventPayload::TouchMove { x, y, velocity })
    }

    pub fn touch_press(timestamp_us: u64, pressure: f32, area: f32) -> Self {
        Self::new(timestamp_us, EventPayload::TouchPress { pressure, area })
    }

    pub fn motion_sample(timestamp_us: u64, ax: f32, ay: f32, az: f32) -> Self {
        Self::new(timestamp_us, EventPayload::MotionSample { ax, ay, az })
    }
}

// ============================================================================
// TESTS
// ============================================================================
