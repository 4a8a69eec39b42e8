//! Multipart chunk emission
//!
//! Wire format shared with existing stream consumers: a fixed boundary
//! token, one part per frame, each part carrying the exact payload length
//! and the capture timestamp.

use crate::camera::{FrameTimestamp, NormalizedFrame};
use once_cell::sync::Lazy;
use std::future::Future;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Fixed private boundary token; collision-free only because both ends of
/// the protocol agree on it, never generated per-session.
pub const PART_BOUNDARY: &str = "123456789000000000000987654321";

pub static STREAM_CONTENT_TYPE: Lazy<String> =
    Lazy::new(|| format!("multipart/x-mixed-replace;boundary={PART_BOUNDARY}"));

static STREAM_BOUNDARY: Lazy<String> = Lazy::new(|| format!("\r\n--{PART_BOUNDARY}\r\n"));

/// Open response stream accepting raw chunk writes. Headers are assumed
/// already sent by the time the first chunk goes out.
pub trait ChunkSink {
    fn send_chunk(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;
}

/// `ChunkSink` over any async writer (the stream-plane TCP socket).
pub struct WriteSink<W>(pub W);

impl<W> ChunkSink for WriteSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_chunk(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.0.write_all(bytes).await
    }
}

fn part_header(len: usize, timestamp: &FrameTimestamp) -> String {
    format!(
        "Content-Type: image/jpeg\r\nContent-Length: {}\r\nX-Timestamp: {}.{:06}\r\n\r\n",
        len, timestamp.sec, timestamp.usec
    )
}

/// Emits one frame as a multipart chunk: boundary, part header, payload.
///
/// Each write is gated on the previous one succeeding; the first failure
/// aborts the sequence and is reported unchanged. The frame buffer stays
/// with the caller, who releases it after (and regardless of) the outcome.
pub async fn send_part<S: ChunkSink>(sink: &mut S, frame: &NormalizedFrame) -> io::Result<()> {
    sink.send_chunk(STREAM_BOUNDARY.as_bytes()).await?;

    let header = part_header(frame.len(), &frame.timestamp);
    sink.send_chunk(header.as_bytes()).await?;

    sink.send_chunk(frame.bytes()).await?;

    Ok(())
}
