//! ABOUTME: Density aggregation and alert state machine for crowd analytics
//! ABOUTME: Grid occupancy, temporal smoothing, occupant heuristic, hysteretic alerts

pub mod alerts;
pub mod density;

pub use alerts::{AlertConfig, AlertEvent, AlertMachine, AlertStatus};
pub use density::{DensityAggregator, DensityConfig, DensityGrid, DensityHistory, DensitySample};
