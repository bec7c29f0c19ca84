//! ABOUTME: Shared testing utilities and helper functions
//! ABOUTME: Synthetic frame fixtures for vision, analysis, and engine tests

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Create a uniform RGB frame with every channel set to `level`
pub fn uniform_frame(width: u32, height: u32, level: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([level, level, level]))
}

/// Create a uniform frame with a brighter rectangular block, simulating a
/// moving object against a static background
pub fn frame_with_block(
    width: u32,
    height: u32,
    background: u8,
    block: (u32, u32, u32, u32),
    intensity: u8,
) -> RgbImage {
    let mut frame = uniform_frame(width, height, background);
    let (bx, by, bw, bh) = block;
    for y in by..(by + bh).min(height) {
        for x in bx..(bx + bw).min(width) {
            frame.put_pixel(x, y, Rgb([intensity, intensity, intensity]));
        }
    }
    frame
}

/// Create a binary mask with a filled foreground rectangle
pub fn mask_with_block(width: u32, height: u32, block: (u32, u32, u32, u32)) -> GrayImage {
    let mut mask = GrayImage::from_pixel(width, height, Luma([0u8]));
    let (bx, by, bw, bh) = block;
    for y in by..(by + bh).min(height) {
        for x in bx..(bx + bw).min(width) {
            mask.put_pixel(x, y, Luma([255u8]));
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_with_block() {
        let frame = frame_with_block(32, 32, 64, (4, 4, 8, 8), 200);
        assert_eq!(frame.get_pixel(0, 0).0[0], 64);
        assert_eq!(frame.get_pixel(6, 6).0[0], 200);
    }

    #[test]
    fn test_mask_with_block_clips_to_bounds() {
        let mask = mask_with_block(16, 16, (12, 12, 10, 10));
        assert_eq!(mask.get_pixel(15, 15).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }
}
