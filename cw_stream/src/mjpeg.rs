//! ABOUTME: MJPEG streaming over multipart/x-mixed-replace HTTP responses
//! ABOUTME: Polls the latest-frame cell and deduplicates by sequence number

use crate::{FrameCell, StreamMetrics};
use bytes::{Bytes, BytesMut};
use futures_util::stream::Stream;
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tracing::{debug, warn};
use uuid::Uuid;

/// MJPEG frame stream that implements the Stream trait.
///
/// Each poll emits at most one multipart frame part; a frame already sent
/// (same sequence) is never re-sent, and readers that lag simply skip to
/// the newest frame, which is the intended only-the-newest semantics of the
/// single-slot cell.
pub struct MjpegStream {
    /// Shared latest-frame cell
    cell: Arc<FrameCell>,
    /// Boundary string for the multipart response
    boundary: String,
    /// Connection ID for logging
    connection_id: Uuid,
    /// Whether the initial boundary has been emitted
    started: bool,
    /// Sequence of the last frame sent to this client
    last_sequence: Option<u64>,
    /// Metrics for connection and drop accounting
    metrics: StreamMetrics,
}

impl MjpegStream {
    /// Create a new MJPEG stream over the shared frame cell
    pub fn new(cell: Arc<FrameCell>, metrics: StreamMetrics) -> Self {
        let boundary = format!("mjpeg_boundary_{}", Uuid::new_v4());
        let connection_id = Uuid::new_v4();
        metrics.connections_total.inc();
        metrics.clients.inc();

        debug!(
            connection_id = %connection_id,
            boundary = %boundary,
            "New MJPEG stream client"
        );

        Self {
            cell,
            boundary,
            connection_id,
            started: false,
            last_sequence: None,
            metrics,
        }
    }

    /// Content type for the multipart response
    pub fn content_type(&self) -> String {
        format!("multipart/x-mixed-replace; boundary={}", self.boundary)
    }

    /// Multipart boundary for this connection
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Generate the per-frame multipart header
    fn frame_header(&self, frame_size: usize) -> Bytes {
        let header = format!(
            "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            self.boundary, frame_size
        );
        Bytes::from(header)
    }
}

impl Stream for MjpegStream {
    type Item = Result<Bytes, actix_web::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if !self.started {
            self.started = true;
            let initial_boundary = format!("--{}\r\n", self.boundary);
            return Poll::Ready(Some(Ok(Bytes::from(initial_boundary))));
        }

        let latest = self.cell.latest();
        match latest {
            Some(frame) if self.last_sequence != Some(frame.metadata.sequence) => {
                if let Some(last) = self.last_sequence {
                    let skipped = frame.metadata.sequence.saturating_sub(last + 1);
                    if skipped > 0 {
                        warn!(
                            connection_id = %self.connection_id,
                            skipped_frames = skipped,
                            "Stream lagged behind, frames skipped"
                        );
                        self.metrics.frames_dropped.inc_by(skipped);
                    }
                }
                self.last_sequence = Some(frame.metadata.sequence);

                let mut response = BytesMut::new();
                response.extend_from_slice(&self.frame_header(frame.size()));
                response.extend_from_slice(&frame.data);
                response.extend_from_slice(b"\r\n");
                Poll::Ready(Some(Ok(response.freeze())))
            }
            _ => {
                // No frame yet, or the newest frame was already sent:
                // poll again rather than blocking the producer.
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
}

impl Drop for MjpegStream {
    fn drop(&mut self) {
        debug!(
            connection_id = %self.connection_id,
            "MJPEG stream connection dropped"
        );
        self.metrics.clients.dec();
        self.metrics.disconnections_total.inc();
    }
}
