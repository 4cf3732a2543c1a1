// Rickshaw Passenger Unit — Ranging Filter
//
// Converts raw ultrasonic round-trip times into a distance estimate. A
// missed echo (timeout → 0 µs) is common when nothing reflects or the
// target is angled; it means "no update", never "subject gone", so the
// filter retains the last valid distance instead of collapsing a presence
// session.

use crate::config::{DISTANCE_THRESHOLD_M, US_TO_METERS};

/// Round-trip echo duration to metres. Zero (timed-out) durations yield 0.0,
/// which `RangeFilter` treats as invalid.
pub fn echo_us_to_meters(duration_us: u32) -> f32 {
    duration_us as f32 * US_TO_METERS
}

#[derive(Debug, Default)]
pub struct RangeFilter {
    last_valid_m: f32,
}

impl RangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw reading (`None` or 0.0 = missed echo). Returns the
    /// current distance estimate.
    pub fn update(&mut self, raw_m: Option<f32>) -> f32 {
        if let Some(d) = raw_m {
            if d > 0.0 {
                self.last_valid_m = d;
            }
        }
        self.last_valid_m
    }

    pub fn distance_m(&self) -> f32 {
        self.last_valid_m
    }

    /// Whether the current estimate counts as "in range". Never true before
    /// the first valid reading.
    pub fn in_range(&self) -> bool {
        self.last_valid_m > 0.0 && self.last_valid_m <= DISTANCE_THRESHOLD_M
    }

    /// Forget the held distance (used when the auth machine resets).
    pub fn reset(&mut self) {
        self.last_valid_m = 0.0;
    }
}
