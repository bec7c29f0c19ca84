//! ABOUTME: Session runtime statistics and the programmatic snapshot
//! ABOUTME: Peak/average density window, alert totals, running flag

use cw_analysis::{AlertEvent, AlertStatus};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

/// Recent smoothed densities contributing to the running average
const DENSITY_WINDOW: usize = 100;

/// Structured snapshot for programmatic polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub running: bool,
    pub density: f64,
    pub people: u32,
    pub peak_density: f64,
    pub avg_density: f64,
    pub total_alerts: u64,
    pub alert_active: bool,
}

#[derive(Debug, Default)]
struct StatsInner {
    current_density: f64,
    estimated_people: u32,
    alert_active: bool,
    peak_density: f64,
    total_alerts: u64,
    window: VecDeque<f64>,
}

/// Mutable session statistics.
///
/// Written once per frame by the single ingestion worker; read by the
/// snapshot endpoint. The lock is held only for the field updates.
#[derive(Debug, Default)]
pub struct RuntimeStats {
    running: AtomicBool,
    inner: Mutex<StatsInner>,
}

impl RuntimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Zero the per-session figures at session start
    pub fn reset_session(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner = StatsInner::default();
    }

    /// Record one processed frame
    pub fn record(
        &self,
        density: f64,
        estimated_people: u32,
        alert_active: bool,
        event: Option<&AlertEvent>,
    ) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.current_density = density;
        inner.estimated_people = estimated_people;
        inner.alert_active = alert_active;
        inner.peak_density = inner.peak_density.max(density);
        if let Some(event) = event {
            if event.status == AlertStatus::High {
                inner.total_alerts += 1;
            }
        }
        if inner.window.len() == DENSITY_WINDOW {
            inner.window.pop_front();
        }
        inner.window.push_back(density);
    }

    /// Snapshot for the polling API
    pub fn snapshot(&self) -> EngineSnapshot {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let avg = if inner.window.is_empty() {
            0.0
        } else {
            inner.window.iter().sum::<f64>() / inner.window.len() as f64
        };
        EngineSnapshot {
            running: self.is_running(),
            density: round3(inner.current_density),
            people: inner.estimated_people,
            peak_density: round3(inner.peak_density),
            avg_density: round3(avg),
            total_alerts: inner.total_alerts,
            alert_active: inner.alert_active,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
