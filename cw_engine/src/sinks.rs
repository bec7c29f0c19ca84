//! ABOUTME: Outbound alert event sinks and the bundled alert log collaborator
//! ABOUTME: Best-effort delivery; sink failures never interrupt the processing loop

use cw_analysis::AlertEvent;
use cw_core::{Error, Result};
use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::Mutex,
};
use tracing::{debug, warn};

/// Receiver of emitted alert events.
///
/// Transport and durable delivery are collaborator concerns; the engine
/// only hands events over and logs failures.
pub trait EventSink: Send + Sync {
    /// Deliver one event
    fn deliver(&self, event: &AlertEvent) -> Result<()>;

    /// Sink name for logging
    fn name(&self) -> &str;
}

/// In-memory alert history with bounded best-effort file persistence.
///
/// Holds the most recent `memory_capacity` events for listing
/// (most-recent-first) and writes the newest `persist_count` to a JSON
/// file after each delivery.
pub struct AlertLog {
    entries: Mutex<VecDeque<AlertEvent>>,
    memory_capacity: usize,
    persist_count: usize,
    persist_path: Option<PathBuf>,
}

impl AlertLog {
    pub fn new(
        memory_capacity: usize,
        persist_count: usize,
        persist_path: Option<PathBuf>,
    ) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            memory_capacity: memory_capacity.max(1),
            persist_count: persist_count.max(1),
            persist_path,
        }
    }

    /// The most recent events, newest first
    pub fn recent(&self, limit: usize) -> Vec<AlertEvent> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Number of events currently held in memory
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &VecDeque<AlertEvent>) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let start = entries.len().saturating_sub(self.persist_count);
        let tail: Vec<&AlertEvent> = entries.iter().skip(start).collect();
        let json = serde_json::to_string_pretty(&tail)
            .map_err(|e| Error::Sink(format!("alert log serialization: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Sink(format!("alert log directory: {}", e)))?;
        }
        std::fs::write(path, json).map_err(|e| Error::Sink(format!("alert log write: {}", e)))?;
        Ok(())
    }
}

impl EventSink for AlertLog {
    fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.memory_capacity {
            entries.pop_front();
        }
        entries.push_back(event.clone());
        debug!(
            status = ?event.status,
            held = entries.len(),
            "Alert event logged"
        );

        if let Err(e) = self.persist(&entries) {
            // Persistence is best effort; the in-memory log stays intact.
            warn!(error = %e, "Failed to persist alert log");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "alert_log"
    }
}
