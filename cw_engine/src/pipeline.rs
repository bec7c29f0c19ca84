//! ABOUTME: Per-frame analytics pipeline: segment, aggregate, alert, render, encode
//! ABOUTME: Owns the stateful engine components for one capture session

use crate::params::SharedParams;
use chrono::{DateTime, Utc};
use cw_analysis::{
    AlertConfig, AlertEvent, AlertMachine, DensityAggregator, DensityConfig, DensitySample,
};
use cw_render::{Compositor, CompositorConfig};
use cw_stream::{EncoderConfig, FrameEncoder};
use cw_vision::{MotionSegmenter, SegmenterConfig};
use image::RgbImage;
use std::sync::Arc;
use tracing::warn;

/// Configuration for all pipeline stages
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub segmenter: SegmenterConfig,
    pub density: DensityConfig,
    pub alerts: AlertConfig,
    pub compositor: CompositorConfig,
    pub encoder: EncoderConfig,
}

/// Result of processing one frame
pub struct ProcessedFrame {
    /// Aggregated density data
    pub sample: DensitySample,
    /// Emitted alert transition, if any
    pub event: Option<AlertEvent>,
    /// Encoded composited frame; `None` when encoding failed (logged, never
    /// fatal to the analytics)
    pub jpeg: Option<Vec<u8>>,
    /// Alert state after this frame
    pub alert_active: bool,
}

/// The per-frame analytics engine for one session.
///
/// All mutable analytic state (background model, density history, alert
/// state) lives here and is owned exclusively by the ingestion worker; one
/// call to `process` mutates it exactly once.
pub struct FrameEngine {
    segmenter: MotionSegmenter,
    aggregator: DensityAggregator,
    alerts: AlertMachine,
    compositor: Compositor,
    encoder: FrameEncoder,
    params: Arc<SharedParams>,
}

impl FrameEngine {
    pub fn new(site_id: String, config: PipelineConfig, params: Arc<SharedParams>) -> Self {
        Self {
            segmenter: MotionSegmenter::new(config.segmenter),
            aggregator: DensityAggregator::new(config.density),
            alerts: AlertMachine::new(site_id, config.alerts),
            compositor: Compositor::new(config.compositor),
            encoder: FrameEncoder::new(config.encoder),
            params,
        }
    }

    /// Run one frame through the full pipeline
    pub fn process(
        &mut self,
        frame: &RgbImage,
        sequence: u64,
        now: DateTime<Utc>,
    ) -> ProcessedFrame {
        // Live-tunable parameters are picked up at the start of each frame.
        let threshold = self.params.threshold();
        let opacity = self.params.opacity();

        let segmentation = self.segmenter.segment(frame);
        let sample = self
            .aggregator
            .observe(&segmentation.mask, segmentation.extreme_pan);
        let event = self.alerts.evaluate(
            sample.smoothed_density,
            threshold,
            sample.estimated_people,
            sequence,
            now,
        );

        let composited = self.compositor.compose(
            frame,
            &sample.grid,
            sample.smoothed_density,
            threshold,
            opacity,
            segmentation.extreme_pan,
        );
        let jpeg = match self.encoder.encode(&composited) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(sequence, error = %e, "Frame encoding failed");
                None
            }
        };

        ProcessedFrame {
            sample,
            event,
            jpeg,
            alert_active: self.alerts.is_active(),
        }
    }

    /// Reset all per-session analytic state, as when a looped source
    /// restarts from its beginning.
    pub fn reset(&mut self) {
        self.segmenter.reset();
        self.aggregator.reset();
        self.alerts.reset();
    }

    /// JPEG quality frames are encoded at
    pub fn quality(&self) -> u8 {
        self.encoder.quality()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_support::{frame_with_block, uniform_frame};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn engine(threshold: f64) -> FrameEngine {
        FrameEngine::new(
            "site-test".to_string(),
            PipelineConfig::default(),
            Arc::new(SharedParams::new(threshold, 0.7)),
        )
    }

    #[test]
    fn test_static_frames_stay_at_zero_density() {
        let mut engine = engine(0.45);
        let frame = uniform_frame(100, 100, 80);
        for seq in 1..=5 {
            let result = engine.process(&frame, seq, at(seq as i64));
            assert_eq!(result.sample.smoothed_density, 0.0);
            assert_eq!(result.sample.estimated_people, 0);
            assert!(result.event.is_none());
            assert!(!result.alert_active);
            assert!(result.jpeg.is_some());
        }
    }

    #[test]
    fn test_motion_produces_density_and_people() {
        let mut engine = engine(0.95);
        let background = uniform_frame(100, 100, 40);
        for seq in 1..=6 {
            let _ = engine.process(&background, seq, at(seq as i64));
        }
        let moving = frame_with_block(100, 100, 40, (20, 20, 50, 50), 220);
        let result = engine.process(&moving, 7, at(7));
        assert!(result.sample.smoothed_density > 0.0);
        assert!(result.sample.estimated_people >= 1);
    }

    #[test]
    fn test_low_threshold_raises_alert_event() {
        let mut engine = engine(0.001);
        let background = uniform_frame(100, 100, 40);
        for seq in 1..=6 {
            let _ = engine.process(&background, seq, at(seq as i64));
        }
        let moving = frame_with_block(100, 100, 40, (20, 20, 50, 50), 220);
        let result = engine.process(&moving, 7, at(7));
        let event = result.event.expect("crossing should emit HIGH");
        assert_eq!(event.frame_sequence, 7);
        assert!(result.alert_active);
    }

    #[test]
    fn test_reset_behaves_like_fresh_engine() {
        let mut engine = engine(0.45);
        let a = uniform_frame(100, 100, 30);
        let b = uniform_frame(100, 100, 220);
        let _ = engine.process(&a, 1, at(1));
        let _ = engine.process(&b, 2, at(2));

        engine.reset();

        // Identical frame pair after reset: no leftover motion against a
        // stale reference.
        let frame = uniform_frame(100, 100, 128);
        let first = engine.process(&frame, 3, at(3));
        assert!(!first.sample.extreme_pan);
        assert_eq!(first.sample.foreground_pixels, 0);
        assert_eq!(first.sample.smoothed_density, 0.0);
        let second = engine.process(&frame, 4, at(4));
        assert!(!second.sample.extreme_pan);
        assert_eq!(second.sample.foreground_pixels, 0);
    }
}
