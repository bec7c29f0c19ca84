//! ABOUTME: Binary mask morphology with elliptical structuring elements
//! ABOUTME: Dilate, erode, open, and close used to clean foreground masks

use image::{GrayImage, Luma};

/// Offsets of an elliptical structuring element with the given diameter.
///
/// Matches the usual elliptical kernel: every offset whose normalized
/// distance from the center is within the half-axes.
pub fn elliptical_kernel(diameter: u32) -> Vec<(i32, i32)> {
    let d = diameter.max(1) as i32;
    let r = (d - 1) / 2;
    let half = ((d - 1) as f32) / 2.0;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if half == 0.0 {
                offsets.push((0, 0));
                continue;
            }
            let nx = dx as f32 / half.max(1.0);
            let ny = dy as f32 / half.max(1.0);
            if nx * nx + ny * ny <= 1.0 {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Set every pixel with a foreground neighbor under the kernel
pub fn dilate(mask: &GrayImage, kernel: &[(i32, i32)]) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::from_pixel(width, height, Luma([0u8]));
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let hit = kernel.iter().any(|&(dx, dy)| {
                let (nx, ny) = (x + dx, y + dy);
                nx >= 0
                    && ny >= 0
                    && nx < width as i32
                    && ny < height as i32
                    && mask.get_pixel(nx as u32, ny as u32).0[0] > 0
            });
            if hit {
                out.put_pixel(x as u32, y as u32, Luma([255u8]));
            }
        }
    }
    out
}

/// Keep only pixels whose entire in-bounds kernel neighborhood is foreground
pub fn erode(mask: &GrayImage, kernel: &[(i32, i32)]) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::from_pixel(width, height, Luma([0u8]));
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let keep = kernel.iter().all(|&(dx, dy)| {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                    return true;
                }
                mask.get_pixel(nx as u32, ny as u32).0[0] > 0
            });
            if keep {
                out.put_pixel(x as u32, y as u32, Luma([255u8]));
            }
        }
    }
    out
}

/// Morphological close: fill gaps by dilating `iterations` times then
/// eroding the same number of times
pub fn close(mask: &GrayImage, kernel: &[(i32, i32)], iterations: u32) -> GrayImage {
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = dilate(&current, kernel);
    }
    for _ in 0..iterations {
        current = erode(&current, kernel);
    }
    current
}

/// Morphological open: remove speckle by eroding then dilating
pub fn open(mask: &GrayImage, kernel: &[(i32, i32)], iterations: u32) -> GrayImage {
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = erode(&current, kernel);
    }
    for _ in 0..iterations {
        current = dilate(&current, kernel);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::mask_with_block;

    #[test]
    fn test_elliptical_kernel_contains_center_and_axes() {
        let kernel = elliptical_kernel(7);
        assert!(kernel.contains(&(0, 0)));
        assert!(kernel.contains(&(3, 0)));
        assert!(kernel.contains(&(0, -3)));
        // Corners of the bounding box are outside the ellipse
        assert!(!kernel.contains(&(3, 3)));
    }

    #[test]
    fn test_dilate_grows_region() {
        let mask = mask_with_block(20, 20, (8, 8, 4, 4));
        let grown = dilate(&mask, &elliptical_kernel(3));
        let before = mask.pixels().filter(|p| p.0[0] > 0).count();
        let after = grown.pixels().filter(|p| p.0[0] > 0).count();
        assert!(after > before);
        assert_eq!(grown.get_pixel(7, 9).0[0], 255);
    }

    #[test]
    fn test_erode_shrinks_region() {
        let mask = mask_with_block(20, 20, (8, 8, 6, 6));
        let shrunk = erode(&mask, &elliptical_kernel(3));
        let before = mask.pixels().filter(|p| p.0[0] > 0).count();
        let after = shrunk.pixels().filter(|p| p.0[0] > 0).count();
        assert!(after < before);
        assert_eq!(shrunk.get_pixel(8, 8).0[0], 0);
        assert_eq!(shrunk.get_pixel(10, 10).0[0], 255);
    }

    #[test]
    fn test_close_fills_small_hole() {
        let mut mask = mask_with_block(20, 20, (5, 5, 9, 9));
        mask.put_pixel(9, 9, image::Luma([0u8]));
        let closed = close(&mask, &elliptical_kernel(3), 1);
        assert_eq!(closed.get_pixel(9, 9).0[0], 255);
    }

    #[test]
    fn test_open_removes_speckle() {
        let mut mask = mask_with_block(20, 20, (5, 5, 8, 8));
        mask.put_pixel(18, 2, image::Luma([255u8]));
        let opened = open(&mask, &elliptical_kernel(3), 1);
        assert_eq!(opened.get_pixel(18, 2).0[0], 0);
        assert_eq!(opened.get_pixel(9, 9).0[0], 255);
    }
}
