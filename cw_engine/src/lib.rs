//! ABOUTME: Ingestion loop, session controller, and engine runtime state
//! ABOUTME: Drives capture, segmentation, density, alerts, and rendering per frame

pub mod params;
pub mod pipeline;
pub mod runtime;
pub mod session;
pub mod sinks;

pub use params::SharedParams;
pub use pipeline::{FrameEngine, PipelineConfig, ProcessedFrame};
pub use runtime::{EngineSnapshot, RuntimeStats};
pub use session::{SessionConfig, SessionController, SourceFactory, StartRequest};
pub use sinks::{AlertLog, EventSink};
