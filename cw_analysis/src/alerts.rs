//! ABOUTME: Hysteretic alert state machine comparing smoothed density to a threshold
//! ABOUTME: Emits HIGH/CLEAR events gated by an entry cooldown and a clear-hold window

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Alert timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Minimum seconds between repeated HIGH events while density stays
    /// above the threshold
    pub cooldown_seconds: f64,
    /// Minimum seconds an alert must hold before it may clear, preventing
    /// flapping at the threshold boundary
    pub clear_hold_seconds: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 3.0,
            clear_hold_seconds: 2.0,
        }
    }
}

/// Alert status carried on emitted events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "CLEAR")]
    Clear,
}

/// A threshold-crossing event.
///
/// Immutable once constructed; the engine emits it and never stores it.
/// Persistence and transport are collaborator concerns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub site_id: String,
    #[serde(with = "second_precision")]
    pub timestamp: DateTime<Utc>,
    pub density: f64,
    pub threshold: f64,
    pub estimated_people: u32,
    pub frame_sequence: u64,
    pub status: AlertStatus,
}

/// Serialize timestamps as UTC with second precision
mod second_precision {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        let naive =
            NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)?;
        Ok(naive.and_utc())
    }
}

/// Two-state hysteretic alert machine.
///
/// `CLEAR -> ALERTING` fires when density exceeds the threshold and either
/// no alert is active or the cooldown has elapsed, so repeated HIGH events
/// while density stays high are spaced at least one cooldown apart.
/// `ALERTING -> CLEAR` fires when density is back at or below the threshold
/// and the clear-hold window has elapsed since the last transition. Both the
/// current time and the observation are explicit arguments, so a single
/// evaluation is deterministic given prior state.
pub struct AlertMachine {
    config: AlertConfig,
    site_id: String,
    active: bool,
    last_transition: Option<DateTime<Utc>>,
}

impl AlertMachine {
    pub fn new(site_id: String, config: AlertConfig) -> Self {
        Self {
            config,
            site_id,
            active: false,
            last_transition: None,
        }
    }

    /// Whether an alert is currently active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Time of the last transition, if any
    pub fn last_transition(&self) -> Option<DateTime<Utc>> {
        self.last_transition
    }

    /// Evaluate one frame's smoothed density against the threshold.
    ///
    /// Returns the emitted event when a transition (or a cooldown-spaced
    /// repeat HIGH) fires; state and density continue to be recomputed every
    /// frame regardless.
    pub fn evaluate(
        &mut self,
        density: f64,
        threshold: f64,
        estimated_people: u32,
        frame_sequence: u64,
        now: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        let over = density > threshold;
        let elapsed = self.seconds_since_transition(now);

        if over && (!self.active || elapsed >= self.config.cooldown_seconds) {
            self.active = true;
            self.last_transition = Some(now);
            let event = self.event(density, threshold, estimated_people, frame_sequence, now, AlertStatus::High);
            info!(
                site_id = %event.site_id,
                density = event.density,
                threshold = event.threshold,
                frame_sequence,
                "Density alert raised"
            );
            return Some(event);
        }

        if !over && self.active && elapsed >= self.config.clear_hold_seconds {
            self.active = false;
            self.last_transition = Some(now);
            let event = self.event(density, threshold, estimated_people, frame_sequence, now, AlertStatus::Clear);
            info!(
                site_id = %event.site_id,
                density = event.density,
                frame_sequence,
                "Density alert cleared"
            );
            return Some(event);
        }

        None
    }

    /// Forget alert state (used when a looped source restarts)
    pub fn reset(&mut self) {
        self.active = false;
        self.last_transition = None;
    }

    fn seconds_since_transition(&self, now: DateTime<Utc>) -> f64 {
        match self.last_transition {
            Some(at) => (now - at).num_milliseconds() as f64 / 1000.0,
            None => f64::INFINITY,
        }
    }

    fn event(
        &self,
        density: f64,
        threshold: f64,
        estimated_people: u32,
        frame_sequence: u64,
        now: DateTime<Utc>,
        status: AlertStatus,
    ) -> AlertEvent {
        AlertEvent {
            site_id: self.site_id.clone(),
            timestamp: now,
            density: round3(density),
            threshold: round3(threshold),
            estimated_people,
            frame_sequence,
            status,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn machine(cooldown: f64) -> AlertMachine {
        AlertMachine::new(
            "site-test".to_string(),
            AlertConfig {
                cooldown_seconds: cooldown,
                clear_hold_seconds: 2.0,
            },
        )
    }

    #[test]
    fn test_first_crossing_raises_high() {
        let mut m = machine(3.0);
        let event = m.evaluate(0.6, 0.45, 4, 1, at(0)).expect("should fire");
        assert_eq!(event.status, AlertStatus::High);
        assert_eq!(event.site_id, "site-test");
        assert_eq!(event.frame_sequence, 1);
        assert!(m.is_active());
    }

    #[test]
    fn test_repeat_high_respects_cooldown() {
        let mut m = machine(3.0);
        assert!(m.evaluate(0.6, 0.45, 4, 1, at(0)).is_some());
        // Still above threshold before the cooldown: no new event
        assert!(m.evaluate(0.6, 0.45, 4, 2, at(1)).is_none());
        assert!(m.evaluate(0.6, 0.45, 4, 3, at(2)).is_none());
        // At the cooldown boundary a repeat HIGH fires
        let repeat = m.evaluate(0.6, 0.45, 4, 4, at(3)).expect("repeat HIGH");
        assert_eq!(repeat.status, AlertStatus::High);
    }

    #[test]
    fn test_density_sequence_scenario() {
        // [0.1, 0.1, 0.6, 0.6, 0.6], threshold 0.45, cooldown 3s, 1s apart:
        // HIGH fires at t=2 and no further HIGH before t=5.
        let mut m = machine(3.0);
        let densities = [0.1, 0.1, 0.6, 0.6, 0.6];
        let mut events = Vec::new();
        for (i, &d) in densities.iter().enumerate() {
            if let Some(e) = m.evaluate(d, 0.45, 2, i as u64, at(i as i64)) {
                events.push((i, e));
            }
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, 2);
        assert_eq!(events[0].1.status, AlertStatus::High);
    }

    #[test]
    fn test_clear_waits_for_hold_window() {
        let mut m = machine(3.0);
        assert!(m.evaluate(0.6, 0.45, 4, 1, at(0)).is_some());
        // Dropping below threshold immediately does not clear
        assert!(m.evaluate(0.2, 0.45, 1, 2, at(1)).is_none());
        assert!(m.is_active());
        // After the 2s hold window the clear fires
        let event = m.evaluate(0.2, 0.45, 1, 3, at(2)).expect("should clear");
        assert_eq!(event.status, AlertStatus::Clear);
        assert!(!m.is_active());
    }

    #[test]
    fn test_no_flapping_at_boundary() {
        let mut m = machine(3.0);
        assert!(m.evaluate(0.6, 0.45, 4, 1, at(0)).is_some());
        // Oscillating around the threshold inside both windows emits nothing
        assert!(m.evaluate(0.44, 0.45, 2, 2, at(1)).is_none());
        assert!(m.evaluate(0.46, 0.45, 2, 3, at(2)).is_none());
        assert!(m.evaluate(0.44, 0.45, 2, 4, at(1)).is_none());
    }

    #[test]
    fn test_density_at_threshold_does_not_raise() {
        let mut m = machine(3.0);
        assert!(m.evaluate(0.45, 0.45, 2, 1, at(0)).is_none());
        assert!(!m.is_active());
    }

    #[test]
    fn test_reset_forgets_state() {
        let mut m = machine(3.0);
        assert!(m.evaluate(0.6, 0.45, 4, 1, at(0)).is_some());
        m.reset();
        assert!(!m.is_active());
        // A crossing right after reset fires immediately
        assert!(m.evaluate(0.6, 0.45, 4, 2, at(1)).is_some());
    }

    #[test]
    fn test_event_serialization() {
        let mut m = machine(3.0);
        let event = m.evaluate(0.61234, 0.45, 4, 7, at(0)).unwrap();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"status\":\"HIGH\""));
        assert!(json.contains("\"density\":0.612"));
        assert!(json.contains("\"frame_sequence\":7"));
        // Second-precision UTC timestamp
        assert!(json.contains("Z\""));
        let parsed: AlertEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, AlertStatus::High);
        assert_eq!(parsed.timestamp, event.timestamp);
    }
}
