//! ABOUTME: Capture adapter for video sources (devices, files, network streams)
//! ABOUTME: Provides trait-based frame sources decoded through an ffmpeg child process

use cw_core::Result;
use image::RgbImage;

pub mod descriptor;
pub mod ffmpeg_source;
pub mod scripted;

pub use descriptor::{SourceDescriptor, SourceKind, FINITE_EXTENSIONS, STREAMING_SCHEMES};
pub use ffmpeg_source::{DecoderSettings, FfmpegSource};
pub use scripted::ScriptedSource;

/// Outcome of a single read from a video source
#[derive(Debug)]
pub enum ReadOutcome {
    /// A decoded RGB frame
    Frame(RgbImage),
    /// The source produced no further frames
    EndOfStream,
}

/// Trait for frame-producing video sources
///
/// A source owns exactly one open decode handle. `release` is idempotent and
/// safe to call on an already-released source; `Drop` implementations call it
/// so a handle is never leaked past the owning session.
pub trait VideoSource: Send {
    /// Read the next frame
    fn read(&mut self) -> Result<ReadOutcome>;

    /// Restart a finite source from its first frame
    fn rewind(&mut self) -> Result<()>;

    /// Release the underlying handle; no-op when already released
    fn release(&mut self);

    /// What kind of source this is, driving the end-of-stream policy
    fn kind(&self) -> SourceKind;
}
