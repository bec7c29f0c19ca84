//! ABOUTME: Per-pixel statistical background model for foreground segmentation
//! ABOUTME: Running mean/variance per pixel with tunable learning rate and history

use image::{GrayImage, Luma};
use tracing::debug;

/// Initial per-pixel variance for a freshly observed pixel
const VAR_INIT: f32 = 15.0;
/// Variance floor preventing a fully learned pixel from flagging noise
const VAR_MIN: f32 = 4.0;
/// Variance ceiling preventing runaway growth on chaotic scenes
const VAR_MAX: f32 = 5.0 * VAR_INIT;

/// Variance-tested background subtractor.
///
/// Each pixel carries a running mean and variance of its observed intensity.
/// A pixel whose squared deviation from the mean exceeds
/// `variance_threshold * variance` is classified foreground. The model state
/// is bounded by the history window: with no explicit learning rate, updates
/// use `1 / history`.
pub struct BackgroundModel {
    history: u32,
    variance_threshold: f32,
    width: u32,
    height: u32,
    mean: Vec<f32>,
    variance: Vec<f32>,
}

impl BackgroundModel {
    /// Create an empty model; state is allocated on the first frame
    pub fn new(history: u32, variance_threshold: f64) -> Self {
        Self {
            history: history.max(1),
            variance_threshold: variance_threshold as f32,
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
        }
    }

    /// Whether the model has absorbed at least one frame
    pub fn is_initialized(&self) -> bool {
        !self.mean.is_empty()
    }

    /// Update the model with a grayscale frame and return the raw
    /// foreground mask (255 foreground, 0 background).
    ///
    /// A non-positive `learning_rate` selects the history-derived default.
    /// The first frame (and any frame after a dimension change) initializes
    /// the model and reports no foreground.
    pub fn apply(&mut self, frame: &GrayImage, learning_rate: f64) -> GrayImage {
        let (width, height) = frame.dimensions();
        let pixels = frame.as_raw();

        if !self.is_initialized() || self.width != width || self.height != height {
            debug!(width, height, "Initializing background model");
            self.width = width;
            self.height = height;
            self.mean = pixels.iter().map(|&p| p as f32).collect();
            self.variance = vec![VAR_INIT; pixels.len()];
            return GrayImage::from_pixel(width, height, Luma([0u8]));
        }

        let alpha = if learning_rate > 0.0 {
            learning_rate as f32
        } else {
            1.0 / self.history as f32
        };

        let mut mask = GrayImage::from_pixel(width, height, Luma([0u8]));
        let out: &mut [u8] = &mut mask;
        for (i, &p) in pixels.iter().enumerate() {
            let value = p as f32;
            let delta = value - self.mean[i];
            let dist_sq = delta * delta;
            if dist_sq > self.variance_threshold * self.variance[i] {
                out[i] = 255;
            }
            self.mean[i] += alpha * delta;
            self.variance[i] =
                (self.variance[i] + alpha * (dist_sq - self.variance[i])).clamp(VAR_MIN, VAR_MAX);
        }
        mask
    }

    /// Discard all accumulated state
    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.mean.clear();
        self.variance.clear();
    }
}
