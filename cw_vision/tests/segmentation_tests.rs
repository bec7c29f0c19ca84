//! ABOUTME: Integration tests for motion segmentation with synthetic frame sequences
//! ABOUTME: Exercises pan-ratio boundaries, model re-adaptation, and reset behavior

use cw_vision::{MotionSegmenter, SegmenterConfig};
use test_support::{frame_with_block, uniform_frame};

/// Changing well over 60% of pixels between frames flags an extreme pan
#[test]
fn test_change_above_pan_ratio_flags_pan() {
    let mut segmenter = MotionSegmenter::new(SegmenterConfig::default());
    let _ = segmenter.segment(&uniform_frame(100, 100, 20));

    // An 80x80 block changes 64% of the frame
    let result = segmenter.segment(&frame_with_block(100, 100, 20, (0, 0, 80, 80), 230));
    assert!(result.extreme_pan);
}

/// Changing under 60% of pixels is treated as genuine motion, not a pan
#[test]
fn test_change_below_pan_ratio_is_not_a_pan() {
    let mut segmenter = MotionSegmenter::new(SegmenterConfig::default());
    let _ = segmenter.segment(&uniform_frame(100, 100, 20));

    // A 70x80 block changes 56% of the frame
    let result = segmenter.segment(&frame_with_block(100, 100, 20, (0, 0, 70, 80), 230));
    assert!(!result.extreme_pan);
}

/// After a scene cut the elevated learning rate re-adapts the model instead
/// of flagging the new scene as foreground indefinitely
#[test]
fn test_model_readapts_after_scene_cut() {
    let mut segmenter = MotionSegmenter::new(SegmenterConfig::default());
    let old_scene = uniform_frame(64, 64, 20);
    for _ in 0..10 {
        let _ = segmenter.segment(&old_scene);
    }

    let new_scene = uniform_frame(64, 64, 230);
    let cut = segmenter.segment(&new_scene);
    assert!(cut.extreme_pan);

    let mut settled = None;
    for frame in 0..400 {
        let result = segmenter.segment(&new_scene);
        assert!(!result.extreme_pan);
        if result.foreground_pixels == 0 {
            settled = Some(frame);
            break;
        }
    }
    assert!(settled.is_some(), "model never re-adapted to the new scene");
}

/// A moving object against a settled background produces a coherent
/// foreground region sized for density counting
#[test]
fn test_moving_object_yields_merged_region() {
    let mut segmenter = MotionSegmenter::new(SegmenterConfig::default());
    let background = uniform_frame(100, 100, 40);
    for _ in 0..10 {
        let _ = segmenter.segment(&background);
    }

    let walker = frame_with_block(100, 100, 40, (30, 30, 20, 40), 220);
    let result = segmenter.segment(&walker);
    assert!(!result.extreme_pan);
    // The merge dilation grows the blob into a region larger than the
    // object itself, the shape the density grid counts.
    assert!(result.foreground_pixels > 20 * 40);
    assert!(result.foreground_pixels < 100 * 100);
}

/// Reset makes a reused segmenter behave exactly like a fresh instance
#[test]
fn test_reset_matches_fresh_instance() {
    let mut reused = MotionSegmenter::new(SegmenterConfig::default());
    let _ = reused.segment(&uniform_frame(64, 64, 10));
    let _ = reused.segment(&uniform_frame(64, 64, 250));
    reused.reset();

    let mut fresh = MotionSegmenter::new(SegmenterConfig::default());
    let frame = frame_with_block(64, 64, 90, (8, 8, 16, 16), 200);
    let a = reused.segment(&frame);
    let b = fresh.segment(&frame);
    assert_eq!(a.extreme_pan, b.extreme_pan);
    assert_eq!(a.foreground_pixels, b.foreground_pixels);
    assert_eq!(a.mask.as_raw(), b.mask.as_raw());
}
