//! ABOUTME: Metrics collection for streaming services
//! ABOUTME: Prometheus counters for frame publishing and client connections

use prometheus_client::metrics::{counter::Counter, gauge::Gauge};

/// Metrics for streaming operations
#[derive(Debug, Clone, Default)]
pub struct StreamMetrics {
    /// Total frames published to the frame cell
    pub frames_published: Counter,
    /// Total frame encoding errors
    pub encode_errors: Counter,
    /// Current number of connected stream clients
    pub clients: Gauge,
    /// Total client connections
    pub connections_total: Counter,
    /// Total client disconnections
    pub disconnections_total: Counter,
    /// Frames a lagging client skipped past
    pub frames_dropped: Counter,
}

impl StreamMetrics {
    /// Create new streaming metrics
    pub fn new() -> Self {
        Self::default()
    }
}
