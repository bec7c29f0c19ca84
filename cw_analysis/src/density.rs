//! ABOUTME: Spatial density aggregation over a fixed grid with temporal smoothing
//! ABOUTME: Computes per-cell occupancy, moving-average density, and the occupant heuristic

use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Tuning for density aggregation.
///
/// The occupant-estimate coefficients are empirical placeholders to
/// calibrate against real footage, not derived constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityConfig {
    /// Square cell edge in pixels
    pub cell_size: u32,
    /// Moving-average window over recent raw densities
    pub history_capacity: usize,
    /// Foreground pixels attributed to one person
    pub pixels_per_person: u32,
    /// Divisor correcting systematic overcounting from blob merging
    pub overcount_correction: f64,
    /// Factor applied to density and estimate on an extreme pan, since a
    /// pan produces widespread spurious foreground
    pub pan_attenuation: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            cell_size: 25,
            history_capacity: 15,
            pixels_per_person: 800,
            overcount_correction: 3.5,
            pan_attenuation: 0.5,
        }
    }
}

/// Grid of per-cell foreground occupancy fractions.
///
/// Fully recomputed each frame; rows and columns cover the mask in whole
/// cells, trailing partial cells are ignored.
#[derive(Debug, Clone)]
pub struct DensityGrid {
    cols: u32,
    rows: u32,
    cells: Vec<f32>,
}

impl DensityGrid {
    /// Partition a binary mask into cells and compute per-cell occupancy
    pub fn from_mask(mask: &GrayImage, cell_size: u32) -> Self {
        let cell_size = cell_size.max(1);
        let (width, height) = mask.dimensions();
        let cols = width / cell_size;
        let rows = height / cell_size;
        let cell_area = (cell_size * cell_size) as f32;

        let mut cells = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows {
            for col in 0..cols {
                let y0 = row * cell_size;
                let x0 = col * cell_size;
                let mut occupied = 0u32;
                for y in y0..y0 + cell_size {
                    for x in x0..x0 + cell_size {
                        if mask.get_pixel(x, y).0[0] > 0 {
                            occupied += 1;
                        }
                    }
                }
                cells.push(occupied as f32 / cell_area);
            }
        }

        Self { cols, rows, cells }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Occupancy fraction of the cell at (row, col)
    pub fn cell(&self, row: u32, col: u32) -> f32 {
        self.cells[(row * self.cols + col) as usize]
    }

    /// Row-major cell values
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    /// Mean occupancy across all cells; 0 for an empty grid
    pub fn mean(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.cells.iter().map(|&c| c as f64).sum::<f64>() / self.cells.len() as f64
    }
}

/// Fixed-capacity ring of recent raw density values
#[derive(Debug, Clone)]
pub struct DensityHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl DensityHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a value, evicting the oldest at capacity
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Arithmetic mean of the buffered values; 0 when empty
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Buffered values, oldest first
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

/// One frame's worth of aggregated density data
#[derive(Debug)]
pub struct DensitySample {
    /// Per-cell occupancy grid for visualization
    pub grid: DensityGrid,
    /// Pan-attenuated raw density of this frame
    pub raw_density: f64,
    /// Moving average over the history window
    pub smoothed_density: f64,
    /// Occupant-count heuristic (coarse, uncalibrated)
    pub estimated_people: u32,
    /// Foreground pixels observed in the mask
    pub foreground_pixels: u32,
    /// Whether the frame was flagged as an extreme pan
    pub extreme_pan: bool,
}

/// Aggregates foreground masks into density samples, carrying the history
/// window across frames.
pub struct DensityAggregator {
    config: DensityConfig,
    history: DensityHistory,
}

impl DensityAggregator {
    pub fn new(config: DensityConfig) -> Self {
        let history = DensityHistory::new(config.history_capacity);
        Self { config, history }
    }

    pub fn config(&self) -> &DensityConfig {
        &self.config
    }

    /// Aggregate one frame's mask
    pub fn observe(&mut self, mask: &GrayImage, extreme_pan: bool) -> DensitySample {
        let grid = DensityGrid::from_mask(mask, self.config.cell_size);

        let mut raw_density = grid.mean();
        if extreme_pan {
            raw_density *= self.config.pan_attenuation;
        }
        self.history.push(raw_density);
        let smoothed_density = self.history.mean();

        let foreground_pixels = mask.pixels().filter(|p| p.0[0] > 0).count() as u32;
        let estimated_people = self.estimate_people(foreground_pixels, extreme_pan);

        debug!(
            raw_density,
            smoothed_density, estimated_people, foreground_pixels, extreme_pan, "Aggregated frame"
        );

        DensitySample {
            grid,
            raw_density,
            smoothed_density,
            estimated_people,
            foreground_pixels,
            extreme_pan,
        }
    }

    /// Coarse occupant heuristic: coverage divided by a pixels-per-person
    /// constant, corrected for blob-merge overcounting, floored at each
    /// step, with a minimum of one whenever any foreground exists. The pan
    /// attenuation is applied last and may floor the estimate to zero.
    fn estimate_people(&self, foreground_pixels: u32, extreme_pan: bool) -> u32 {
        if foreground_pixels == 0 {
            return 0;
        }
        let per_person = (foreground_pixels / self.config.pixels_per_person).max(1);
        let mut estimate =
            ((per_person as f64 / self.config.overcount_correction).floor() as u32).max(1);
        if extreme_pan {
            estimate = (estimate as f64 * self.config.pan_attenuation).floor() as u32;
        }
        estimate
    }

    /// Clear the temporal smoothing window (used when a looped source
    /// restarts from its beginning)
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Entries currently held in the smoothing window
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::mask_with_block;

    fn empty_mask(width: u32, height: u32) -> GrayImage {
        GrayImage::new(width, height)
    }

    #[test]
    fn test_grid_dimensions_truncate_partial_cells() {
        let mask = empty_mask(110, 60);
        let grid = DensityGrid::from_mask(&mask, 25);
        assert_eq!(grid.cols(), 4);
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cells().len(), 8);
    }

    #[test]
    fn test_grid_cell_occupancy_fraction() {
        // Fill exactly the first 25x25 cell
        let mask = mask_with_block(100, 50, (0, 0, 25, 25));
        let grid = DensityGrid::from_mask(&mask, 25);
        assert_eq!(grid.cell(0, 0), 1.0);
        assert_eq!(grid.cell(0, 1), 0.0);
        assert_eq!(grid.cell(1, 0), 0.0);
        // 1 full cell out of 8
        assert!((grid.mean() - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_history_caps_at_capacity_in_order() {
        let mut history = DensityHistory::new(15);
        for i in 0..40 {
            history.push(i as f64);
        }
        assert_eq!(history.len(), 15);
        let values: Vec<f64> = history.values().collect();
        let expected: Vec<f64> = (25..40).map(|i| i as f64).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_history_mean_is_simple_moving_average() {
        let mut history = DensityHistory::new(15);
        history.push(0.2);
        history.push(0.4);
        assert!((history.mean() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_observe_smooths_over_window() {
        let mut agg = DensityAggregator::new(DensityConfig::default());
        let busy = mask_with_block(100, 100, (0, 0, 100, 100));
        let quiet = empty_mask(100, 100);

        let first = agg.observe(&busy, false);
        assert!((first.raw_density - 1.0).abs() < 1e-9);
        assert!((first.smoothed_density - 1.0).abs() < 1e-9);

        let second = agg.observe(&quiet, false);
        assert_eq!(second.raw_density, 0.0);
        assert!((second.smoothed_density - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_pan_halves_raw_density() {
        let mut with_pan = DensityAggregator::new(DensityConfig::default());
        let mut without = DensityAggregator::new(DensityConfig::default());
        let mask = mask_with_block(100, 100, (0, 0, 50, 100));

        let panned = with_pan.observe(&mask, true);
        let normal = without.observe(&mask, false);
        assert!((panned.raw_density - normal.raw_density * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_is_zero_without_foreground() {
        let mut agg = DensityAggregator::new(DensityConfig::default());
        let sample = agg.observe(&empty_mask(100, 100), false);
        assert_eq!(sample.estimated_people, 0);
    }

    #[test]
    fn test_estimate_floors_at_one_with_any_foreground() {
        let mut agg = DensityAggregator::new(DensityConfig::default());
        let sample = agg.observe(&mask_with_block(100, 100, (0, 0, 3, 3)), false);
        assert_eq!(sample.estimated_people, 1);
    }

    #[test]
    fn test_estimate_arithmetic() {
        let mut agg = DensityAggregator::new(DensityConfig::default());
        // 100x100 fully foreground: 10000 px -> 10000/800 = 12 -> 12/3.5
        // floored = 3
        let sample = agg.observe(&mask_with_block(100, 100, (0, 0, 100, 100)), false);
        assert_eq!(sample.estimated_people, 3);
    }

    #[test]
    fn test_pan_halves_estimate_after_flooring() {
        let mut with_pan = DensityAggregator::new(DensityConfig::default());
        let mut without = DensityAggregator::new(DensityConfig::default());
        let mask = mask_with_block(100, 100, (0, 0, 100, 100));

        let normal = without.observe(&mask, false);
        let panned = with_pan.observe(&mask, true);
        assert_eq!(
            panned.estimated_people,
            (normal.estimated_people as f64 * 0.5).floor() as u32
        );
    }

    #[test]
    fn test_pan_can_floor_small_estimate_to_zero() {
        let mut agg = DensityAggregator::new(DensityConfig::default());
        let sample = agg.observe(&mask_with_block(100, 100, (0, 0, 3, 3)), true);
        assert_eq!(sample.estimated_people, 0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut agg = DensityAggregator::new(DensityConfig::default());
        let _ = agg.observe(&mask_with_block(100, 100, (0, 0, 100, 100)), false);
        assert_eq!(agg.history_len(), 1);

        agg.reset();
        assert_eq!(agg.history_len(), 0);

        let sample = agg.observe(&empty_mask(100, 100), false);
        assert_eq!(sample.smoothed_density, 0.0);
    }
}
