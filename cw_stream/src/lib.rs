//! ABOUTME: Frame hand-off and MJPEG streaming services
//! ABOUTME: Single-slot latest-frame cell, JPEG encoding, multipart stream, metrics

mod frame_cell;
mod frame_encoder;
mod metrics;
mod mjpeg;

pub use frame_cell::{FrameCell, FrameMetadata, SharedFrame};
pub use frame_encoder::{EncoderConfig, EncoderStats, FrameEncoder};
pub use metrics::StreamMetrics;
pub use mjpeg::MjpegStream;
