//! ABOUTME: Core error types and tracing utilities
//! ABOUTME: Foundation crate used by all other crowdwatch components

pub mod error;
pub mod telemetry;

pub use error::{Error, Result};
