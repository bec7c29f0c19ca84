//! ABOUTME: Live-tunable engine parameters shared with the ingestion loop
//! ABOUTME: Atomic f64 cells read with relaxed ordering, next-frame visibility

use cw_config::{clamp_opacity, clamp_threshold};
use std::sync::atomic::{AtomicU64, Ordering};

/// Threshold and opacity cells shared between the control surface and the
/// ingestion loop.
///
/// Reads and writes use relaxed ordering: an update only needs to be seen
/// by the next frame, there is no transactional requirement. Values are
/// clamped on write so the loop never observes an out-of-range parameter.
#[derive(Debug)]
pub struct SharedParams {
    threshold_bits: AtomicU64,
    opacity_bits: AtomicU64,
}

impl SharedParams {
    pub fn new(threshold: f64, opacity: f64) -> Self {
        Self {
            threshold_bits: AtomicU64::new(clamp_threshold(threshold).to_bits()),
            opacity_bits: AtomicU64::new(clamp_opacity(opacity).to_bits()),
        }
    }

    pub fn threshold(&self) -> f64 {
        f64::from_bits(self.threshold_bits.load(Ordering::Relaxed))
    }

    pub fn opacity(&self) -> f64 {
        f64::from_bits(self.opacity_bits.load(Ordering::Relaxed))
    }

    /// Update both parameters, clamping into their valid ranges
    pub fn update(&self, threshold: f64, opacity: f64) {
        self.threshold_bits
            .store(clamp_threshold(threshold).to_bits(), Ordering::Relaxed);
        self.opacity_bits
            .store(clamp_opacity(opacity).to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new(0.45, 0.70)
    }
}
