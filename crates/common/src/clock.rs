//! Clock and timing utilities for track synchronization.
//!
//! The video track is driven by tick counts and the audio track by sample
//! counts; both are derived from the same per-scene duration through the
//! helpers here so the two tracks stay aligned scene by scene.

use std::time::{Duration, Instant};

/// Absorbs binary floating point noise before rounding up
/// (`2.8 * 30.0 == 84.00000000000001`).
const CEIL_EPSILON: f64 = 1e-9;

/// A wall clock anchored at the start of a run, used for progress
/// reporting and for enforcing wall-clock budgets.
#[derive(Debug, Clone)]
pub struct RunClock {
    /// The instant the run started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl RunClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get seconds elapsed since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

/// Fixed-rate frame clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    fps: u32,
}

impl FrameClock {
    /// Create a clock for the given frame rate. A rate of zero is clamped
    /// to one frame per second.
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Number of ticks needed to cover `secs`: `ceil(secs * fps)`.
    pub fn frames_for(&self, secs: f64) -> u64 {
        if secs <= 0.0 {
            return 0;
        }
        (secs * self.fps as f64 - CEIL_EPSILON).ceil() as u64
    }

    /// Duration covered by `frames` ticks.
    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        frames as f64 / self.fps as f64
    }

    /// Period of one tick.
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.fps as u64)
    }

    /// One frame expressed in milliseconds.
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.fps as f64
    }
}

/// Number of PCM frames (per channel) covering `secs` at `sample_rate`,
/// rounded to the nearest sample.
pub fn samples_for(secs: f64, sample_rate: u32) -> u64 {
    if secs <= 0.0 {
        return 0;
    }
    (secs * sample_rate as f64).round() as u64
}

/// Drift measurement between two streams.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Duration of the reference stream (ns).
    pub reference_ns: u64,
    /// Duration of the measured stream (ns).
    pub measured_ns: u64,
}

impl DriftMeasurement {
    /// Build a measurement from durations in seconds.
    pub fn from_secs(reference_secs: f64, measured_secs: f64) -> Self {
        Self {
            reference_ns: secs_to_ns(reference_secs),
            measured_ns: secs_to_ns(measured_secs),
        }
    }

    /// Drift in nanoseconds (positive = measured is longer).
    pub fn drift_ns(&self) -> i64 {
        self.measured_ns as i64 - self.reference_ns as i64
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_ns() as f64 / 1_000_000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

/// Convert seconds to nanoseconds, clamping negatives to zero.
pub fn secs_to_ns(secs: f64) -> u64 {
    (secs.max(0.0) * 1_000_000_000.0).round() as u64
}
