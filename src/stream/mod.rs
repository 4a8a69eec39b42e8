//! Per-connection MJPEG streaming
//!
//! One session per accepted stream connection. The loop acquires a frame,
//! normalizes it to JPEG, emits it as a multipart chunk, releases whichever
//! buffer is held, and feeds the frame interval into the shared rolling
//! filter. The first capture, encode, or transport failure terminates the
//! session; the client is expected to reconnect.

pub mod chunk;
pub mod stats;

pub use chunk::{send_part, ChunkSink, WriteSink, PART_BOUNDARY, STREAM_CONTENT_TYPE};
pub use stats::{RaFilter, StreamTelemetry};

use crate::camera::{normalize, CaptureError, FrameSource};
use crate::encode::{EncodeError, JpegEncoder};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("transport failed: {0}")]
    Transport(#[from] io::Error),
}

/// A long-lived streaming session bound to one connection.
pub struct StreamSession<C, E> {
    camera: Arc<Mutex<C>>,
    encoder: Arc<E>,
    telemetry: Arc<StreamTelemetry>,
}

impl<C, E> StreamSession<C, E>
where
    C: FrameSource,
    E: JpegEncoder,
{
    pub fn new(camera: Arc<Mutex<C>>, encoder: Arc<E>, telemetry: Arc<StreamTelemetry>) -> Self {
        Self {
            camera,
            encoder,
            telemetry,
        }
    }

    /// Runs until the first unrecoverable failure and returns it.
    ///
    /// The shared last-frame clock is seeded on entry if no session has
    /// set it yet, and cleared again on exit so the next connection
    /// reseeds from scratch.
    pub async fn run<S: ChunkSink>(&self, sink: &mut S) -> StreamError {
        self.telemetry.seed_clock();

        let mut frames = 0u64;
        let err = loop {
            if let Err(e) = self.stream_one(sink).await {
                break e;
            }

            let avg_ms = self.telemetry.record_frame();
            frames += 1;
            if frames % 100 == 0 {
                debug!(frames, avg_ms, "streaming");
            }
        };

        self.telemetry.reset_clock();
        err
    }

    /// One iteration: acquire, normalize, emit, release.
    ///
    /// The release step runs whether or not transmission succeeded; the
    /// transport result is only propagated afterwards. Capture and encode
    /// failures hold no buffer by the time they surface (the normalizer
    /// returns the original to the camera on its own error path).
    async fn stream_one<S: ChunkSink>(&self, sink: &mut S) -> Result<(), StreamError> {
        let mut camera = self.camera.lock().await;

        let frame = camera.acquire().await?;
        let jpeg = normalize(frame, &mut *camera, self.encoder.as_ref())?;

        let sent = send_part(sink, &jpeg).await;
        jpeg.release(&mut *camera);
        sent?;

        Ok(())
    }
}
