//! ABOUTME: Source descriptor parsing and decode-path selection
//! ABOUTME: Classifies device indices, finite files, and network stream URLs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File extensions accepted as finite (loopable) video sources
pub const FINITE_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv"];

/// URL schemes that select the streaming-capable decode path
pub const STREAMING_SCHEMES: &[&str] = &["rtsp://", "rtmp://", "http://", "https://"];

/// What kind of source a descriptor refers to
///
/// The kind drives the end-of-stream policy: finite files loop back to their
/// start, network streams are reopened after a backoff, and a device that
/// stops producing frames ends the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Local capture device by index
    Device,
    /// Finite local file, restarted from the beginning at end of stream
    FiniteFile,
    /// Network or otherwise live source, reopened on read failure
    NetworkStream,
}

/// A parsed video source descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// Capture device index (e.g. `0` for the default webcam)
    Device(u32),
    /// Local video file with a recognized extension
    File(PathBuf),
    /// URL, possibly a network stream
    Url(String),
}

impl SourceDescriptor {
    /// Parse a raw descriptor string.
    ///
    /// A bare unsigned integer selects a capture device; a path with an
    /// extension from the finite-source allowlist selects a loopable file;
    /// everything else is treated as a URL and handed to the decoder, with
    /// the streaming decode path selected by scheme or playlist extension.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(index) = raw.parse::<u32>() {
            return Self::Device(index);
        }
        if !is_streaming_url(raw) && has_finite_extension(raw) {
            return Self::File(PathBuf::from(raw));
        }
        Self::Url(raw.to_string())
    }

    /// The source kind for loop-policy decisions
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Device(_) => SourceKind::Device,
            Self::File(_) => SourceKind::FiniteFile,
            Self::Url(_) => SourceKind::NetworkStream,
        }
    }

    /// Whether the streaming-capable decode path should be used
    pub fn is_streaming(&self) -> bool {
        match self {
            Self::Url(url) => is_streaming_url(url),
            _ => false,
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(index) => write!(f, "device:{}", index),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{}", url),
        }
    }
}

fn is_streaming_url(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    STREAMING_SCHEMES.iter().any(|s| lower.starts_with(s)) || lower.ends_with(".m3u8")
}

fn has_finite_extension(raw: &str) -> bool {
    Path::new(raw)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lower = ext.to_ascii_lowercase();
            FINITE_EXTENSIONS.iter().any(|e| *e == lower)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_index() {
        assert_eq!(SourceDescriptor::parse("0"), SourceDescriptor::Device(0));
        assert_eq!(SourceDescriptor::parse(" 2 "), SourceDescriptor::Device(2));
        assert_eq!(SourceDescriptor::parse("0").kind(), SourceKind::Device);
    }

    #[test]
    fn test_parse_finite_file() {
        for name in ["clip.mp4", "CLIP.MP4", "a/b/footage.mkv", "cam.flv"] {
            let desc = SourceDescriptor::parse(name);
            assert_eq!(desc.kind(), SourceKind::FiniteFile, "{}", name);
            assert!(!desc.is_streaming());
        }
    }

    #[test]
    fn test_parse_streaming_urls() {
        for url in [
            "rtsp://cam.local/stream",
            "rtmp://host/live",
            "http://host/feed",
            "https://host/feed",
            "https://host/playlist.m3u8",
            "file-on-cdn.m3u8",
        ] {
            let desc = SourceDescriptor::parse(url);
            assert_eq!(desc.kind(), SourceKind::NetworkStream, "{}", url);
            assert!(desc.is_streaming(), "{}", url);
        }
    }

    #[test]
    fn test_http_url_with_video_extension_stays_streaming() {
        // Scheme wins over extension: a remote mp4 is not a loopable file.
        let desc = SourceDescriptor::parse("http://host/clip.mp4");
        assert_eq!(desc.kind(), SourceKind::NetworkStream);
    }

    #[test]
    fn test_unrecognized_string_uses_default_decode_path() {
        let desc = SourceDescriptor::parse("udp://239.0.0.1:1234");
        assert_eq!(desc.kind(), SourceKind::NetworkStream);
        assert!(!desc.is_streaming());
    }
}
