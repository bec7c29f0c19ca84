//! ABOUTME: JPEG frame encoding with quality control and throughput stats
//! ABOUTME: Converts composited RGB frames into streamable JPEG payloads

use cw_core::{Error, Result};
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use std::{
    io::Cursor,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::debug;

/// Configuration for frame encoding
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// JPEG quality (1-100, higher is better quality)
    pub jpeg_quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { jpeg_quality: 85 }
    }
}

/// Frame encoding statistics
#[derive(Debug, Clone, Default)]
pub struct EncoderStats {
    /// Total frames encoded
    pub frames_encoded: Arc<AtomicU64>,
    /// Total output bytes generated
    pub output_bytes_total: Arc<AtomicU64>,
    /// Encoding failures
    pub encoding_failures: Arc<AtomicU64>,
}

impl EncoderStats {
    /// Average encoded frame size in bytes
    pub fn avg_frame_size(&self) -> u64 {
        let frames = self.frames_encoded.load(Ordering::Relaxed);
        if frames == 0 {
            0
        } else {
            self.output_bytes_total.load(Ordering::Relaxed) / frames
        }
    }
}

/// JPEG encoder for composited frames
pub struct FrameEncoder {
    config: EncoderConfig,
    stats: EncoderStats,
}

impl FrameEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        debug!(quality = config.jpeg_quality, "Creating frame encoder");
        Self {
            config,
            stats: EncoderStats::default(),
        }
    }

    /// Encode an RGB frame to JPEG bytes
    pub fn encode(&self, frame: &RgbImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder =
            JpegEncoder::new_with_quality(Cursor::new(&mut buffer), self.config.jpeg_quality);
        if let Err(e) = frame.write_with_encoder(encoder) {
            self.stats.encoding_failures.fetch_add(1, Ordering::Relaxed);
            return Err(Error::Encode(format!("JPEG encoding failed: {}", e)));
        }

        self.stats.frames_encoded.fetch_add(1, Ordering::Relaxed);
        self.stats
            .output_bytes_total
            .fetch_add(buffer.len() as u64, Ordering::Relaxed);
        Ok(buffer)
    }

    /// Quality this encoder writes at
    pub fn quality(&self) -> u8 {
        self.config.jpeg_quality
    }

    /// Encoding statistics
    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }
}
