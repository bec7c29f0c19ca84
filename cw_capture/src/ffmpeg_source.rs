//! ABOUTME: ffmpeg-backed video source producing raw RGB24 frames over a pipe
//! ABOUTME: Probes dimensions with ffprobe and selects decode flags per source kind

use crate::{ReadOutcome, SourceDescriptor, SourceKind, VideoSource};
use cw_core::{Error, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

/// External decoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderSettings {
    /// ffmpeg binary used for decoding
    pub ffmpeg_bin: String,
    /// ffprobe binary used for dimension probing
    pub ffprobe_bin: String,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

/// Video source decoding frames through an ffmpeg child process.
///
/// The child writes raw RGB24 frames to stdout; one `read` consumes exactly
/// one frame's worth of bytes. The child is killed and reaped on `release`
/// and on drop, so a session never leaves a decoder behind.
pub struct FfmpegSource {
    descriptor: SourceDescriptor,
    settings: DecoderSettings,
    width: u32,
    height: u32,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl FfmpegSource {
    /// Open a source, probing its dimensions and spawning the decoder.
    ///
    /// Any partially spawned child is killed before an error is returned.
    pub fn open(descriptor: SourceDescriptor, settings: DecoderSettings) -> Result<Self> {
        let (width, height) = probe_dimensions(&descriptor, &settings)?;
        info!(
            source = %descriptor,
            width,
            height,
            streaming = descriptor.is_streaming(),
            "Opening video source"
        );

        let mut source = Self {
            descriptor,
            settings,
            width,
            height,
            child: None,
            stdout: None,
        };
        source.spawn_decoder()?;
        Ok(source)
    }

    /// Frame dimensions reported by the probe
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn spawn_decoder(&mut self) -> Result<()> {
        let mut cmd = Command::new(&self.settings.ffmpeg_bin);
        cmd.arg("-v").arg("error");
        cmd.args(input_args(&self.descriptor));
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        debug!(source = %self.descriptor, "Spawning ffmpeg decoder");
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::CannotOpen(format!("{}: {}", self.descriptor, e)))?;

        match child.stdout.take() {
            Some(stdout) => {
                self.child = Some(child);
                self.stdout = Some(stdout);
                Ok(())
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(Error::CannotOpen(format!(
                    "{}: decoder produced no output pipe",
                    self.descriptor
                )))
            }
        }
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl VideoSource for FfmpegSource {
    fn read(&mut self) -> Result<ReadOutcome> {
        let frame_len = self.frame_len();
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(ReadOutcome::EndOfStream);
        };

        let mut buf = vec![0u8; frame_len];
        match stdout.read_exact(&mut buf) {
            Ok(()) => {
                let image = RgbImage::from_raw(self.width, self.height, buf).ok_or_else(|| {
                    Error::TransientRead(format!(
                        "{}: decoded frame did not match {}x{}",
                        self.descriptor, self.width, self.height
                    ))
                })?;
                Ok(ReadOutcome::Frame(image))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!(source = %self.descriptor, "Decoder reached end of stream");
                Ok(ReadOutcome::EndOfStream)
            }
            Err(e) => Err(Error::TransientRead(format!("{}: {}", self.descriptor, e))),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        // Raw pipes cannot seek; restart the decoder from the beginning.
        self.release();
        self.spawn_decoder()
    }

    fn release(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!(source = %self.descriptor, error = %e, "Failed to kill decoder");
            }
            let _ = child.wait();
            debug!(source = %self.descriptor, "Released video source");
        }
    }

    fn kind(&self) -> SourceKind {
        self.descriptor.kind()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Probe frame dimensions with ffprobe
fn probe_dimensions(
    descriptor: &SourceDescriptor,
    settings: &DecoderSettings,
) -> Result<(u32, u32)> {
    let mut cmd = Command::new(&settings.ffprobe_bin);
    cmd.args(["-v", "error", "-select_streams", "v:0"]);
    cmd.args(["-show_entries", "stream=width,height", "-of", "csv=p=0"]);
    cmd.args(input_args(descriptor));
    cmd.stdin(Stdio::null()).stderr(Stdio::null());

    let output = cmd
        .output()
        .map_err(|e| Error::CannotOpen(format!("{}: probe failed: {}", descriptor, e)))?;

    if !output.status.success() {
        return Err(Error::CannotOpen(format!(
            "{}: probe exited with {}",
            descriptor, output.status
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let mut parts = text.trim().split(',');
    let width = parts.next().and_then(|v| v.trim().parse::<u32>().ok());
    let height = parts.next().and_then(|v| v.trim().parse::<u32>().ok());
    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(Error::CannotOpen(format!(
            "{}: probe reported no video stream",
            descriptor
        ))),
    }
}

/// Decoder input arguments, selected by descriptor kind and scheme
fn input_args(descriptor: &SourceDescriptor) -> Vec<String> {
    match descriptor {
        SourceDescriptor::Device(index) => {
            #[cfg(target_os = "linux")]
            {
                vec![
                    "-f".into(),
                    "v4l2".into(),
                    "-i".into(),
                    format!("/dev/video{}", index),
                ]
            }
            #[cfg(not(target_os = "linux"))]
            {
                vec![
                    "-f".into(),
                    "avfoundation".into(),
                    "-i".into(),
                    index.to_string(),
                ]
            }
        }
        SourceDescriptor::File(path) => {
            vec!["-i".into(), path.to_string_lossy().into_owned()]
        }
        SourceDescriptor::Url(url) => {
            let lower = url.to_ascii_lowercase();
            let mut args: Vec<String> = Vec::new();
            if lower.starts_with("rtsp://") {
                args.extend(["-rtsp_transport".into(), "tcp".into()]);
            } else if lower.starts_with("http://")
                || lower.starts_with("https://")
                || lower.ends_with(".m3u8")
            {
                args.extend([
                    "-reconnect".into(),
                    "1".into(),
                    "-reconnect_streamed".into(),
                    "1".into(),
                    "-reconnect_delay_max".into(),
                    "2".into(),
                ]);
            }
            args.extend(["-i".into(), url.clone()]);
            args
        }
    }
}
