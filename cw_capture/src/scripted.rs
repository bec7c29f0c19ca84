//! ABOUTME: Deterministic in-memory video source for tests and demos
//! ABOUTME: Plays a fixed frame script with configurable kind and failure injection

use crate::{ReadOutcome, SourceKind, VideoSource};
use cw_core::{Error, Result};
use image::RgbImage;

/// In-memory source that plays a fixed sequence of frames.
///
/// Behaves like a real source at the trait boundary: frames in order, then
/// `EndOfStream`; `rewind` restarts from the first frame; `release` is
/// idempotent and reads after release report end of stream.
pub struct ScriptedSource {
    frames: Vec<RgbImage>,
    kind: SourceKind,
    position: usize,
    released: bool,
    /// Number of rewinds performed, observable by tests
    pub rewinds: u32,
    /// When set, every read fails with a transient error instead
    pub fail_reads: bool,
}

impl ScriptedSource {
    /// Create a finite-file-like source from a frame script
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self::with_kind(frames, SourceKind::FiniteFile)
    }

    /// Create a source pretending to be the given kind
    pub fn with_kind(frames: Vec<RgbImage>, kind: SourceKind) -> Self {
        Self {
            frames,
            kind,
            position: 0,
            released: false,
            rewinds: 0,
            fail_reads: false,
        }
    }

    /// Whether `release` has been observed
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl VideoSource for ScriptedSource {
    fn read(&mut self) -> Result<ReadOutcome> {
        if self.released {
            return Ok(ReadOutcome::EndOfStream);
        }
        if self.fail_reads {
            return Err(Error::TransientRead("scripted failure".to_string()));
        }
        match self.frames.get(self.position) {
            Some(frame) => {
                self.position += 1;
                Ok(ReadOutcome::Frame(frame.clone()))
            }
            None => Ok(ReadOutcome::EndOfStream),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        self.rewinds += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}
