//! ABOUTME: Motion segmentation with a pure-Rust statistical background model
//! ABOUTME: Produces binary foreground masks and camera-pan detection per frame

use image::{imageops, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod background;
pub mod morphology;

pub use background::BackgroundModel;

// Re-export image types for downstream crates and benches
pub use image;

/// Configuration for motion segmentation
///
/// These are empirical tuning values, kept as named fields so they stay
/// adjustable without touching the algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Per-pixel difference threshold for pan detection (8-bit scale)
    pub pan_diff_threshold: u8,
    /// Fraction of differing pixels that marks an extreme pan
    pub pan_change_ratio: f64,
    /// Background model history window (frames)
    pub history: u32,
    /// Variance multiple above which a pixel is foreground
    pub variance_threshold: f64,
    /// Model learning rate in steady state
    pub learning_rate: f64,
    /// Elevated learning rate during a pan, so the model re-adapts to the
    /// new scene instead of flagging all of it as foreground indefinitely
    pub pan_learning_rate: f64,
    /// Binarization threshold applied to the raw model output
    pub mask_threshold: u8,
    /// Sigma of the smoothing blur applied before the model update
    pub blur_sigma: f32,
    /// Elliptical kernel diameter for close/open cleanup
    pub cleanup_kernel: u32,
    /// Close iterations (fills gaps)
    pub close_iterations: u32,
    /// Open iterations (removes speckle)
    pub open_iterations: u32,
    /// Larger kernel diameter for the final blob-merging dilation
    pub merge_kernel: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            pan_diff_threshold: 30,
            pan_change_ratio: 0.6,
            history: 300,
            variance_threshold: 25.0,
            learning_rate: 0.01,
            pan_learning_rate: 0.03,
            mask_threshold: 200,
            blur_sigma: 1.0,
            cleanup_kernel: 7,
            close_iterations: 2,
            open_iterations: 1,
            merge_kernel: 15,
        }
    }
}

/// Result of segmenting one frame
#[derive(Debug)]
pub struct Segmentation {
    /// Cleaned binary foreground mask (255 foreground, 0 background)
    pub mask: GrayImage,
    /// Whether the frame-to-frame change looked like a camera pan or scene
    /// cut rather than genuine motion
    pub extreme_pan: bool,
    /// Foreground pixel count of the cleaned mask
    pub foreground_pixels: u32,
}

/// Stateful motion segmenter.
///
/// Uninitialized until the first frame, then tracking: each subsequent frame
/// is compared against the previous grayscale frame for pan detection and
/// fed through the background model for foreground extraction.
pub struct MotionSegmenter {
    config: SegmenterConfig,
    background: BackgroundModel,
    prev_gray: Option<GrayImage>,
    cleanup_kernel: Vec<(i32, i32)>,
    merge_kernel: Vec<(i32, i32)>,
}

impl MotionSegmenter {
    /// Create a segmenter in the uninitialized state
    pub fn new(config: SegmenterConfig) -> Self {
        let background = BackgroundModel::new(config.history, config.variance_threshold);
        let cleanup_kernel = morphology::elliptical_kernel(config.cleanup_kernel);
        let merge_kernel = morphology::elliptical_kernel(config.merge_kernel);
        Self {
            config,
            background,
            prev_gray: None,
            cleanup_kernel,
            merge_kernel,
        }
    }

    /// Whether a first frame has been observed
    pub fn is_tracking(&self) -> bool {
        self.prev_gray.is_some()
    }

    /// Current configuration
    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment one frame, updating the background model and the pan
    /// reference in place.
    pub fn segment(&mut self, frame: &RgbImage) -> Segmentation {
        let gray = imageops::grayscale(frame);
        let extreme_pan = self.detect_pan(&gray);

        let blurred = imageops::blur(&gray, self.config.blur_sigma);
        let learning_rate = if extreme_pan {
            self.config.pan_learning_rate
        } else {
            self.config.learning_rate
        };
        let raw = self.background.apply(&blurred, learning_rate);

        let mut mask = binarize(&raw, self.config.mask_threshold);
        mask = morphology::close(&mask, &self.cleanup_kernel, self.config.close_iterations);
        mask = morphology::open(&mask, &self.cleanup_kernel, self.config.open_iterations);
        mask = morphology::dilate(&mask, &self.merge_kernel);

        let foreground_pixels = mask.pixels().filter(|p| p.0[0] > 0).count() as u32;
        debug!(
            foreground_pixels,
            extreme_pan, learning_rate, "Segmented frame"
        );

        Segmentation {
            mask,
            extreme_pan,
            foreground_pixels,
        }
    }

    /// Return to the uninitialized state, discarding the background model
    /// and the previous-frame reference.
    ///
    /// Used when a looped finite source restarts so stale background state
    /// from the previous pass does not bias the new pass.
    pub fn reset(&mut self) {
        debug!("Resetting motion segmenter");
        self.background.reset();
        self.prev_gray = None;
    }

    /// Compare against the previous grayscale frame; the first frame becomes
    /// the reference and reports no pan.
    fn detect_pan(&mut self, gray: &GrayImage) -> bool {
        let Some(prev) = self.prev_gray.replace(gray.clone()) else {
            return false;
        };
        if prev.dimensions() != gray.dimensions() {
            return false;
        }

        let threshold = self.config.pan_diff_threshold;
        let changed = prev
            .as_raw()
            .iter()
            .zip(gray.as_raw().iter())
            .filter(|(&a, &b)| a.abs_diff(b) > threshold)
            .count();
        let ratio = changed as f64 / gray.as_raw().len() as f64;
        ratio > self.config.pan_change_ratio
    }
}

fn binarize(raw: &GrayImage, threshold: u8) -> GrayImage {
    let mut mask = raw.clone();
    for pixel in mask.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    mask
}
