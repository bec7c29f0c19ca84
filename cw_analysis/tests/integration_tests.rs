//! ABOUTME: Integration tests driving density aggregation into the alert machine
//! ABOUTME: Covers threshold crossings, cooldown spacing, and clear hysteresis end to end

use chrono::{DateTime, TimeZone, Utc};
use cw_analysis::{AlertConfig, AlertMachine, AlertStatus, DensityAggregator, DensityConfig};
use image::GrayImage;
use test_support::mask_with_block;

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

fn machine() -> AlertMachine {
    AlertMachine::new(
        "site-test".to_string(),
        AlertConfig {
            cooldown_seconds: 3.0,
            clear_hold_seconds: 2.0,
        },
    )
}

/// A crowd building up raises one HIGH once the smoothed density crosses the
/// threshold, and dispersal clears only after the hold window
#[test]
fn test_crowding_then_dispersal_emits_high_then_clear() {
    let mut aggregator = DensityAggregator::new(DensityConfig::default());
    let mut alerts = machine();

    let crowded = mask_with_block(100, 100, (0, 0, 100, 100));
    let empty = GrayImage::new(100, 100);

    // Frames 1s apart: two quiet, three crowded, three quiet again
    let script: Vec<(&GrayImage, i64)> = vec![
        (&empty, 0),
        (&empty, 1),
        (&crowded, 2),
        (&crowded, 3),
        (&crowded, 4),
        (&empty, 5),
        (&empty, 6),
        (&empty, 7),
    ];

    let mut events = Vec::new();
    for (i, (mask, t)) in script.iter().enumerate() {
        let sample = aggregator.observe(mask, false);
        if let Some(event) = alerts.evaluate(
            sample.smoothed_density,
            0.45,
            sample.estimated_people,
            i as u64 + 1,
            at(*t),
        ) {
            events.push((*t, event));
        }
    }

    assert_eq!(events.len(), 2);

    // The smoothed density first exceeds 0.45 at t=3 (window [0,0,1,1])
    assert_eq!(events[0].0, 3);
    assert_eq!(events[0].1.status, AlertStatus::High);
    assert_eq!(events[0].1.density, 0.5);
    assert_eq!(events[0].1.estimated_people, 3);

    // The drop at t=5 is still over threshold in the smoothed window; t=6 is
    // below and past the 2s hold, so the clear lands there.
    assert_eq!(events[1].0, 6);
    assert_eq!(events[1].1.status, AlertStatus::Clear);
    assert!(events[1].1.density < 0.45);
    assert!(!alerts.is_active());
}

/// Sustained crowding repeats HIGH events spaced exactly one cooldown apart
#[test]
fn test_sustained_crowding_spaces_repeat_highs_by_cooldown() {
    let mut aggregator = DensityAggregator::new(DensityConfig::default());
    let mut alerts = machine();
    let crowded = mask_with_block(100, 100, (0, 0, 100, 100));

    let mut high_times = Vec::new();
    for t in 0..8i64 {
        let sample = aggregator.observe(&crowded, false);
        if let Some(event) = alerts.evaluate(
            sample.smoothed_density,
            0.45,
            sample.estimated_people,
            t as u64 + 1,
            at(t),
        ) {
            assert_eq!(event.status, AlertStatus::High);
            high_times.push(t);
        }
    }
    assert_eq!(high_times, vec![0, 3, 6]);
}

/// The smoothing window fully forgets old frames after capacity turnovers
#[test]
fn test_smoothing_window_forgets_old_frames() {
    let mut aggregator = DensityAggregator::new(DensityConfig::default());
    let crowded = mask_with_block(100, 100, (0, 0, 100, 100));
    let empty = GrayImage::new(100, 100);

    for _ in 0..20 {
        let _ = aggregator.observe(&crowded, false);
    }
    let mut last = f64::NAN;
    for _ in 0..15 {
        last = aggregator.observe(&empty, false).smoothed_density;
    }
    assert_eq!(last, 0.0);
}
