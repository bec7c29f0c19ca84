//! ABOUTME: Single-slot latest-frame buffer shared between producer and readers
//! ABOUTME: Swap-under-lock publish, clone-under-lock read, reference-counted payloads

use bytes::Bytes;
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::trace;

/// Metadata associated with a published frame
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Frame sequence number within the session
    pub sequence: u64,
    /// When the frame was published
    pub timestamp: Instant,
    /// Encoded size in bytes
    pub size: usize,
    /// JPEG quality used for encoding
    pub quality: u8,
}

impl FrameMetadata {
    pub fn new(sequence: u64, size: usize, quality: u8) -> Self {
        Self {
            sequence,
            timestamp: Instant::now(),
            size,
            quality,
        }
    }

    /// Age of this frame
    pub fn age(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// A reference-counted encoded frame.
///
/// Cloning shares the underlying buffer, so handing the latest frame to any
/// number of concurrent readers never copies pixel data.
#[derive(Debug, Clone)]
pub struct SharedFrame {
    /// JPEG payload (shared via Arc)
    pub data: Arc<[u8]>,
    /// Frame metadata
    pub metadata: FrameMetadata,
}

impl SharedFrame {
    /// Create a frame from encoded bytes
    pub fn new(data: Vec<u8>, sequence: u64, quality: u8) -> Self {
        let metadata = FrameMetadata::new(sequence, data.len(), quality);
        Self {
            data: data.into(),
            metadata,
        }
    }

    /// Payload as `Bytes`
    pub fn as_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check the JPEG start-of-image marker
    pub fn is_valid_jpeg(&self) -> bool {
        self.data.len() >= 2 && self.data[0] == 0xFF && self.data[1] == 0xD8
    }
}

/// Guarded latest-value cell holding only the most recent composited frame.
///
/// The producer swaps the slot under the lock; readers clone the `Arc`
/// under the lock. The lock is held only for the swap or clone, never
/// during processing or encoding. Readers that arrive while no frame is
/// available poll rather than block the producer.
#[derive(Debug, Default)]
pub struct FrameCell {
    slot: Mutex<Option<SharedFrame>>,
}

impl FrameCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot with a newer frame
    pub fn publish(&self, frame: SharedFrame) {
        trace!(
            sequence = frame.metadata.sequence,
            size = frame.metadata.size,
            "Publishing frame"
        );
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(frame);
    }

    /// Clone the most recent frame, if any
    pub fn latest(&self) -> Option<SharedFrame> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    /// Sequence number of the most recent frame, if any
    pub fn latest_sequence(&self) -> Option<u64> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|f| f.metadata.sequence)
    }

    /// Empty the slot (used when a session stops)
    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}
