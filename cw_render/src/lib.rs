//! ABOUTME: Visualization compositor producing annotated heatmap frames
//! ABOUTME: Blends a density heatmap over frames with status panel, banner, and legend

use ab_glyph::{FontVec, PxScale};
use cw_analysis::DensityGrid;
use image::{imageops, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

pub mod colormap;

pub use colormap::jet;

/// Fixed overlay geometry, relative to frame dimensions where noted
const PANEL_ORIGIN: (u32, u32) = (10, 10);
const PANEL_WIDTH: u32 = 420;
const PANEL_HEIGHT: u32 = 170;
const PANEL_HEIGHT_PAN: u32 = 190;
const PANEL_DIM_FACTOR: f32 = 0.65;
const BANNER_HEIGHT: u32 = 70;
const LEGEND_SIZE: (u32, u32) = (160, 30);
const LEGEND_MARGIN_RIGHT: u32 = 180;
const LEGEND_TOP: u32 = 20;

const COLOR_WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const COLOR_GRAY: Rgb<u8> = Rgb([200, 200, 200]);
const COLOR_DIM_GRAY: Rgb<u8> = Rgb([150, 150, 150]);
const COLOR_OK: Rgb<u8> = Rgb([0, 255, 0]);
const COLOR_OVER: Rgb<u8> = Rgb([255, 100, 0]);
const COLOR_WARN: Rgb<u8> = Rgb([255, 255, 0]);
const COLOR_BANNER: Rgb<u8> = Rgb([200, 0, 0]);

/// Font locations tried when no explicit path is configured
const FALLBACK_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
];

/// Compositor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositorConfig {
    /// Sigma of the heatmap smoothing blur (51-px-class kernel), applied
    /// after upsampling so cell boundaries don't show as blocks
    pub heatmap_blur_sigma: f32,
    /// TTF font for overlay text; fallback locations are tried when unset
    pub font_path: Option<PathBuf>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            heatmap_blur_sigma: 8.5,
            font_path: None,
        }
    }
}

/// Deterministic frame compositor.
///
/// Rendering is a pure function of its inputs; the only state is the font
/// loaded at construction. Without a usable font the geometric overlays
/// still render and text is skipped.
pub struct Compositor {
    config: CompositorConfig,
    font: Option<FontVec>,
}

impl Compositor {
    pub fn new(config: CompositorConfig) -> Self {
        let font = load_font(config.font_path.as_deref());
        if font.is_none() {
            warn!("No overlay font found; rendering without text");
        }
        Self { config, font }
    }

    /// Render the annotated frame: heatmap blend, status panel, threshold
    /// banner, and color-ramp legend.
    pub fn compose(
        &self,
        frame: &RgbImage,
        grid: &DensityGrid,
        current_density: f64,
        threshold: f64,
        opacity: f64,
        extreme_pan: bool,
    ) -> RgbImage {
        let (width, height) = frame.dimensions();
        let heatmap = self.render_heatmap(grid, width, height);
        let mut display = blend(frame, &heatmap, opacity as f32);

        self.draw_panel(&mut display, current_density, threshold, extreme_pan);
        if current_density > threshold {
            self.draw_banner(&mut display);
        }
        self.draw_legend(&mut display);

        debug!(width, height, current_density, "Composited frame");
        display
    }

    /// Upsample the grid to frame resolution, smooth it, and color it
    fn render_heatmap(&self, grid: &DensityGrid, width: u32, height: u32) -> RgbImage {
        let (cols, rows) = (grid.cols(), grid.rows());
        if cols == 0 || rows == 0 {
            return RgbImage::from_pixel(width, height, jet(0));
        }

        let mut intensity = GrayImage::new(cols, rows);
        for row in 0..rows {
            for col in 0..cols {
                let value = (grid.cell(row, col).clamp(0.0, 1.0) * 255.0).round() as u8;
                intensity.put_pixel(col, row, image::Luma([value]));
            }
        }

        let resized = imageops::resize(&intensity, width, height, imageops::FilterType::Triangle);
        let blurred = imageops::blur(&resized, self.config.heatmap_blur_sigma);

        let mut heatmap = RgbImage::new(width, height);
        for (x, y, pixel) in blurred.enumerate_pixels() {
            heatmap.put_pixel(x, y, jet(pixel.0[0]));
        }
        heatmap
    }

    /// Semi-transparent status panel in the top-left corner
    fn draw_panel(&self, display: &mut RgbImage, density: f64, threshold: f64, extreme_pan: bool) {
        let (width, height) = display.dimensions();
        let panel_height = if extreme_pan {
            PANEL_HEIGHT_PAN
        } else {
            PANEL_HEIGHT
        };
        let x1 = (PANEL_ORIGIN.0 + PANEL_WIDTH).min(width);
        let y1 = (PANEL_ORIGIN.1 + panel_height).min(height);
        for y in PANEL_ORIGIN.1.min(height)..y1 {
            for x in PANEL_ORIGIN.0.min(width)..x1 {
                let pixel = display.get_pixel_mut(x, y);
                for channel in pixel.0.iter_mut() {
                    *channel = (*channel as f32 * PANEL_DIM_FACTOR) as u8;
                }
            }
        }

        let density_color = if density < threshold {
            COLOR_OK
        } else {
            COLOR_OVER
        };
        self.text(display, "CROWDWATCH - Crowd Monitor", 20, 24, 22.0, COLOR_WHITE);
        self.text(
            display,
            &format!("Density: {:.1}%", density * 100.0),
            20,
            88,
            20.0,
            density_color,
        );
        self.text(
            display,
            &format!("Threshold: {:.0}%", threshold * 100.0),
            20,
            120,
            17.0,
            COLOR_GRAY,
        );
        self.text(display, "Mode: Motion Analysis", 20, 146, 15.0, COLOR_DIM_GRAY);
        if extreme_pan {
            self.text(display, "! Fast panning...", 20, 170, 17.0, COLOR_WARN);
        }
    }

    /// Full-width warning banner across the bottom edge
    fn draw_banner(&self, display: &mut RgbImage) {
        let (width, height) = display.dimensions();
        let top = height.saturating_sub(BANNER_HEIGHT);
        for y in top..height {
            for x in 0..width {
                display.put_pixel(x, y, COLOR_BANNER);
            }
        }
        let text_x = (width as i32 / 2 - 200).max(0);
        let text_y = height.saturating_sub(45) as i32;
        self.text(display, "! HIGH CROWD DENSITY!", text_x, text_y, 32.0, COLOR_WHITE);
    }

    /// Color-ramp legend with endpoint labels in the top-right corner
    fn draw_legend(&self, display: &mut RgbImage) {
        let (width, height) = display.dimensions();
        if width < LEGEND_MARGIN_RIGHT || height < LEGEND_TOP + LEGEND_SIZE.1 {
            return;
        }
        let x0 = width - LEGEND_MARGIN_RIGHT;
        for dx in 0..LEGEND_SIZE.0 {
            let intensity = ((dx as f32 / (LEGEND_SIZE.0 - 1) as f32) * 255.0).round() as u8;
            let color = jet(intensity);
            for dy in 0..LEGEND_SIZE.1 {
                display.put_pixel(x0 + dx, LEGEND_TOP + dy, color);
            }
        }
        self.text(display, "Low", x0 as i32, LEGEND_TOP as i32 - 16, 14.0, COLOR_WHITE);
        self.text(
            display,
            "High",
            (x0 + 125) as i32,
            LEGEND_TOP as i32 - 16,
            14.0,
            COLOR_WHITE,
        );
    }

    fn text(&self, display: &mut RgbImage, text: &str, x: i32, y: i32, size: f32, color: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        if y < 0 {
            return;
        }
        draw_text_mut(display, color, x, y, PxScale::from(size), font, text);
    }
}

/// Per-pixel alpha blend of the heatmap over the frame
fn blend(frame: &RgbImage, heatmap: &RgbImage, opacity: f32) -> RgbImage {
    let opacity = opacity.clamp(0.0, 1.0);
    let mut out = RgbImage::new(frame.width(), frame.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let f = frame.get_pixel(x, y);
        let h = heatmap.get_pixel(x, y);
        for c in 0..3 {
            pixel.0[c] =
                (f.0[c] as f32 * (1.0 - opacity) + h.0[c] as f32 * opacity).round() as u8;
        }
    }
    out
}

fn load_font(configured: Option<&std::path::Path>) -> Option<FontVec> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = configured {
        candidates.push(path.to_path_buf());
    }
    candidates.extend(FALLBACK_FONT_PATHS.iter().map(PathBuf::from));

    for path in candidates {
        if let Ok(bytes) = std::fs::read(&path) {
            match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    debug!(path = %path.display(), "Loaded overlay font");
                    return Some(font);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unusable overlay font");
                }
            }
        }
    }
    None
}
