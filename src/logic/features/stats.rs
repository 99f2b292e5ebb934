//! Per-Kind Statistical Aggregation
//!
//! Turns one telemetry window into the fixed aggregate stage defined by
//! `layout.rs`: timing statistics for keystrokes, distributional moments for
//! touch, and fixed-bin spectral energies for motion. Everything here is a
//! pure function of the window.

use crate::logic::telemetry::{EventPayload, TelemetryBuffer};

use super::layout::AGGREGATE_COUNT;

/// Resampled series length for the motion spectral bands.
const SPECTRAL_SAMPLES: usize = 64;

/// Fixed DFT bins for the four motion bands (cycles per window).
const SPECTRAL_BINS: [usize; 4] = [2, 5, 9, 14];

// ============================================================================
// AGGREGATION
// ============================================================================

/// Compute the raw (unscaled) aggregate stage for a window.
pub fn aggregate(window: &TelemetryBuffer) -> [f32; AGGREGATE_COUNT] {
    let mut out = [0.0f32; AGGREGATE_COUNT];
    let span_secs = (window.span_us() as f64 / 1_000_000.0).max(1e-6);

    // Keystroke dynamics
    let mut key_ts: Vec<f64> = Vec::new();
    let mut dwells: Vec<f64> = Vec::new();
    // Touch trajectory
    let mut velocities: Vec<f64> = Vec::new();
    let mut xs: Vec<f64> = Vec::new();
    let mut ys: Vec<f64> = Vec::new();
    // Touch pressure
    let mut press_ts: Vec<f64> = Vec::new();
    let mut pressures: Vec<f64> = Vec::new();
    let mut areas: Vec<f64> = Vec::new();
    // Motion
    let mut motion_ts: Vec<f64> = Vec::new();
    let mut magnitudes: Vec<f64> = Vec::new();

    for event in window.window() {
        let ts_ms = event.timestamp_us as f64 / 1_000.0;
        match event.payload {
            EventPayload::KeyPress { dwell_us } => {
                key_ts.push(ts_ms);
                dwells.push(dwell_us as f64 / 1_000.0);
            }
            EventPayload::TouchMove { x, y, velocity } => {
                velocities.push(velocity as f64);
                xs.push(x as f64);
                ys.push(y as f64);
            }
            EventPayload::TouchPress { pressure, area } => {
                press_ts.push(ts_ms);
                pressures.push(pressure as f64);
                areas.push(area as f64);
            }
            EventPayload::MotionSample { ax, ay, az } => {
                motion_ts.push(ts_ms);
                magnitudes.push(
                    ((ax as f64).powi(2) + (ay as f64).powi(2) + (az as f64).powi(2)).sqrt(),
                );
            }
        }
    }

    // === Keystroke (0-4) ===
    let ikis = intervals(&key_ts);
    out[0] = (key_ts.len() as f64 / span_secs) as f32;
    out[1] = mean(&ikis) as f32;
    out[2] = variance(&ikis) as f32;
    out[3] = mean(&dwells) as f32;
    out[4] = variance(&dwells) as f32;

    // === Touch trajectory (5-9) ===
    out[5] = mean(&velocities) as f32;
    out[6] = variance(&velocities) as f32;
    out[7] = mean(&xs) as f32;
    out[8] = mean(&ys) as f32;
    out[9] = (variance(&xs).sqrt() + variance(&ys).sqrt()) as f32;

    // === Touch pressure (10-13) ===
    out[10] = mean(&pressures) as f32;
    out[11] = variance(&pressures) as f32;
    out[12] = mean(&areas) as f32;
    out[13] = mean(&intervals(&press_ts)) as f32;

    // === Motion (14-19) ===
    out[14] = mean(&magnitudes) as f32;
    out[15] = variance(&magnitudes) as f32;
    let bands = spectral_bands(&magnitudes);
    out[16] = bands[0];
    out[17] = bands[1];
    out[18] = bands[2];
    out[19] = bands[3];

    // === Cross-modal (20-21) ===
    out[20] = window.distinct_kinds() as f32;
    out[21] = (window.len() as f64 / span_secs) as f32;

    // Derived ratios can overflow on degenerate windows; clamp at the edge.
    for v in &mut out {
        if !v.is_finite() {
            *v = 0.0;
        }
    }

    out
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

fn intervals(timestamps: &[f64]) -> Vec<f64> {
    timestamps.windows(2).map(|w| w[1] - w[0]).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Normalized DFT energy at the four fixed bins over a nearest-neighbor
/// resample of the magnitude series. Empty or single-sample series yield
/// zero energy in every band.
fn spectral_bands(series: &[f64]) -> [f32; 4] {
    let mut bands = [0.0f32; 4];
    if series.len() < 2 {
        return bands;
    }

    // Nearest-neighbor resample to a fixed length, mean-removed
    let mut resampled = [0.0f64; SPECTRAL_SAMPLES];
    for (i, slot) in resampled.iter_mut().enumerate() {
        let src = i * (series.len() - 1) / (SPECTRAL_SAMPLES - 1);
        *slot = series[src];
    }
    let m = mean(&resampled);
    for v in &mut resampled {
        *v -= m;
    }

    for (b, &bin) in SPECTRAL_BINS.iter().enumerate() {
        let mut re = 0.0f64;
        let mut im = 0.0f64;
        for (n, &x) in resampled.iter().enumerate() {
            let angle = -2.0 * std::f64::consts::PI * bin as f64 * n as f64
                / SPECTRAL_SAMPLES as f64;
            re += x * angle.cos();
            im += x * angle.sin();
        }
        let energy = (re * re + im * im) / (SPECTRAL_SAMPLES as f64).powi(2);
        bands[b] = energy as f32;
    }

    bands
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::telemetry::TelemetryEvent;

    fn typing_window(iki_us: u64, dwell_us: f32, count: usize) -> TelemetryBuffer {
        let mut buf = TelemetryBuffer::new(1024);
        for i in 0..count {
            buf.push(TelemetryEvent::key_press(i as u64 * iki_us, dwell_us));
            // Second modality so the gate sees a multi-modal window
            buf.push(TelemetryEvent::touch_press(
                i as u64 * iki_us + 10,
                0.5,
                0.15,
            ));
        }
        buf
    }

    #[test]
    fn test_keystroke_aggregates() {
        let window = typing_window(200_000, 90_000.0, 12);
        let agg = aggregate(&window);

        // IKI mean should be ~200ms
        assert!((agg[1] - 200.0).abs() < 1.0, "iki mean {}", agg[1]);
        // Constant cadence: near-zero variance
        assert!(agg[2] < 1.0);
        // Dwell mean ~90ms
        assert!((agg[3] - 90.0).abs() < 0.5);
    }

    #[test]
    fn test_all_aggregates_finite() {
        let mut window = TelemetryBuffer::new(64);
        window.push(TelemetryEvent::key_press(0, 80_000.0));
        let agg = aggregate(&window);
        assert!(agg.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_cross_modal_slots() {
        let window = typing_window(200_000, 90_000.0, 6);
        let agg = aggregate(&window);
        assert_eq!(agg[20], 2.0); // keys + presses
        assert!(agg[21] > 0.0);
    }

    #[test]
    fn test_spectral_bands_flat_series_are_zero() {
        let flat = vec![1.0f64; 32];
        let bands = spectral_bands(&flat);
        for b in bands {
            assert!(b.abs() < 1e-9);
        }
    }

    #[test]
    fn test_spectral_bands_pick_up_oscillation() {
        // Oscillation at ~2 cycles over the window lands in the lowest band
        let series: Vec<f64> = (0..64)
            .map(|n| (2.0 * std::f64::consts::PI * 2.0 * n as f64 / 64.0).sin())
            .collect();
        let bands = spectral_bands(&series);
        assert!(bands[0] > bands[1]);
        assert!(bands[0] > bands[3]);
    }
}
