//! Central Configuration Constants
//!
//! Single source of truth for all engine defaults.
//! Per-deployment tuning goes through `EnginePolicy`, not here.

/// Default cosine similarity threshold for acceptance
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

/// Default auth token lifetime (seconds)
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 300;

/// Minimum telemetry window span before extraction (milliseconds)
pub const DEFAULT_MIN_WINDOW_MS: u64 = 2_000;

/// Capture deadline: give up waiting for a full window after this (milliseconds)
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 10_000;

/// Telemetry ring buffer capacity (events per capture session)
pub const TELEMETRY_CAPACITY: usize = 4_096;

/// Replay nonce retention window (seconds)
pub const DEFAULT_NONCE_TTL_SECS: i64 = 600;

/// Default LSH band count (recall/latency knob)
pub const DEFAULT_INDEX_BANDS: usize = 8;

/// Decay policy defaults
pub const DEFAULT_DECAY_HALF_LIFE_SECS: i64 = 7 * 24 * 3_600;
pub const DEFAULT_DECAY_BLEND_ALPHA: f32 = 0.1;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name (data directory name)
pub const APP_NAME: &str = "behavioral-auth";
