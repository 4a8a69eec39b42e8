//! Session-loop behavior over scripted collaborators

use bytes::Bytes;
use qrcam_streamer::camera::{CaptureError, Frame, FrameSource, FrameTimestamp, PixelFormat};
use qrcam_streamer::encode::{EncodeError, JpegEncoder};
use qrcam_streamer::stream::{ChunkSink, StreamError, StreamSession, StreamTelemetry, PART_BOUNDARY};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;

enum Step {
    Jpeg(&'static [u8]),
    Raw(&'static [u8]),
    Fail,
}

/// Camera whose captures follow a fixed script; counts releases.
struct ScriptedCamera {
    script: VecDeque<Step>,
    acquired: usize,
    released: usize,
}

impl ScriptedCamera {
    fn new(script: Vec<Step>) -> Self {
        Self {
            script: script.into(),
            acquired: 0,
            released: 0,
        }
    }
}

impl FrameSource for ScriptedCamera {
    async fn acquire(&mut self) -> Result<Frame, CaptureError> {
        match self.script.pop_front() {
            Some(Step::Jpeg(data)) => {
                self.acquired += 1;
                Ok(frame(PixelFormat::Jpeg, data, self.acquired))
            }
            Some(Step::Raw(data)) => {
                self.acquired += 1;
                Ok(frame(PixelFormat::Gray8, data, self.acquired))
            }
            Some(Step::Fail) | None => Err(CaptureError::NoFrame),
        }
    }

    fn release(&mut self, frame: Frame) {
        self.released += 1;
        drop(frame);
    }
}

fn frame(format: PixelFormat, data: &'static [u8], seq: usize) -> Frame {
    Frame {
        format,
        data: Bytes::from_static(data),
        width: 4,
        height: 4,
        timestamp: FrameTimestamp {
            sec: 100 + seq as i64,
            usec: 250_000,
        },
    }
}

struct ScriptedEncoder {
    output: Option<&'static [u8]>,
}

impl JpegEncoder for ScriptedEncoder {
    fn encode(&self, _frame: &Frame) -> Result<Bytes, EncodeError> {
        self.output
            .map(Bytes::from_static)
            .ok_or(EncodeError::AlreadyEncoded)
    }
}

/// Sink recording every write, optionally failing from the nth one.
struct RecordingSink {
    chunks: Vec<Vec<u8>>,
    fail_from: Option<usize>,
}

impl RecordingSink {
    fn unlimited() -> Self {
        Self {
            chunks: Vec::new(),
            fail_from: None,
        }
    }

    fn failing_from(index: usize) -> Self {
        Self {
            chunks: Vec::new(),
            fail_from: Some(index),
        }
    }

    fn joined(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

impl ChunkSink for RecordingSink {
    async fn send_chunk(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_from.is_some_and(|n| self.chunks.len() >= n) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client gone"));
        }
        self.chunks.push(bytes.to_vec());
        Ok(())
    }
}

fn session(
    camera: ScriptedCamera,
    encoder: ScriptedEncoder,
) -> (
    StreamSession<ScriptedCamera, ScriptedEncoder>,
    Arc<Mutex<ScriptedCamera>>,
    Arc<StreamTelemetry>,
) {
    let camera = Arc::new(Mutex::new(camera));
    let telemetry = Arc::new(StreamTelemetry::new(20));
    let session = StreamSession::new(Arc::clone(&camera), Arc::new(encoder), Arc::clone(&telemetry));
    (session, camera, telemetry)
}

const JPEG_A: &[u8] = b"\xFF\xD8frame-a\xFF\xD9";
const JPEG_B: &[u8] = b"\xFF\xD8frame-b\xFF\xD9";
const RAW: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
const ENCODED: &[u8] = b"\xFF\xD8encoded\xFF\xD9";

#[tokio::test]
async fn capture_failure_exits_without_writes() {
    let (session, camera, telemetry) =
        session(ScriptedCamera::new(vec![Step::Fail]), ScriptedEncoder { output: None });
    let mut sink = RecordingSink::unlimited();

    let err = session.run(&mut sink).await;

    assert!(matches!(err, StreamError::Capture(_)));
    assert!(sink.chunks.is_empty());
    assert_eq!(camera.lock().await.released, 0);
    assert!(!telemetry.clock_is_set(), "clock must reset on exit");
}

#[tokio::test]
async fn jpeg_frames_stream_until_capture_fails() {
    let (session, camera, _) = session(
        ScriptedCamera::new(vec![Step::Jpeg(JPEG_A), Step::Jpeg(JPEG_B), Step::Fail]),
        ScriptedEncoder { output: None },
    );
    let mut sink = RecordingSink::unlimited();

    let err = session.run(&mut sink).await;

    assert!(matches!(err, StreamError::Capture(_)));
    // two frames, three writes each
    assert_eq!(sink.chunks.len(), 6);

    let camera = camera.lock().await;
    assert_eq!(camera.acquired, 2);
    assert_eq!(camera.released, 2, "every acquired frame returns exactly once");
}

#[tokio::test]
async fn encode_failure_releases_original_and_exits() {
    let (session, camera, _) = session(
        ScriptedCamera::new(vec![Step::Raw(RAW)]),
        ScriptedEncoder { output: None },
    );
    let mut sink = RecordingSink::unlimited();

    let err = session.run(&mut sink).await;

    assert!(matches!(err, StreamError::Encode(_)));
    assert!(sink.chunks.is_empty(), "nothing may be transmitted");
    assert_eq!(camera.lock().await.released, 1);
}

#[tokio::test]
async fn reencoded_frame_streams_new_buffer() {
    let (session, camera, _) = session(
        ScriptedCamera::new(vec![Step::Raw(RAW), Step::Fail]),
        ScriptedEncoder {
            output: Some(ENCODED),
        },
    );
    let mut sink = RecordingSink::unlimited();

    session.run(&mut sink).await;

    assert_eq!(sink.chunks.len(), 3);
    assert_eq!(sink.chunks[2], ENCODED);
    // the original raw buffer went back during normalization; the encoded
    // buffer is heap-owned and never touches the camera
    assert_eq!(camera.lock().await.released, 1);
}

#[tokio::test]
async fn transport_failure_still_releases_frame() {
    // boundary + header succeed, payload write fails
    let (session, camera, telemetry) = session(
        ScriptedCamera::new(vec![Step::Jpeg(JPEG_A), Step::Jpeg(JPEG_B)]),
        ScriptedEncoder { output: None },
    );
    let mut sink = RecordingSink::failing_from(2);

    let err = session.run(&mut sink).await;

    assert!(matches!(err, StreamError::Transport(_)));
    assert_eq!(sink.chunks.len(), 2, "payload write aborted the session");

    let camera = camera.lock().await;
    assert_eq!(camera.acquired, 1, "no second frame after a dead transport");
    assert_eq!(camera.released, 1, "failed transmission still releases");
    assert!(!telemetry.clock_is_set());
}

#[tokio::test]
async fn emitted_stream_matches_wire_format() {
    let (session, _, _) = session(
        ScriptedCamera::new(vec![Step::Jpeg(JPEG_A), Step::Fail]),
        ScriptedEncoder { output: None },
    );
    let mut sink = RecordingSink::unlimited();

    session.run(&mut sink).await;

    let expected_header = format!(
        "Content-Type: image/jpeg\r\nContent-Length: {}\r\nX-Timestamp: 101.250000\r\n\r\n",
        JPEG_A.len()
    );
    let mut expected = Vec::new();
    expected.extend_from_slice(format!("\r\n--{PART_BOUNDARY}\r\n").as_bytes());
    expected.extend_from_slice(expected_header.as_bytes());
    expected.extend_from_slice(JPEG_A);

    assert_eq!(sink.joined(), expected);
}

#[tokio::test]
async fn sessions_share_the_rolling_filter() {
    let camera = Arc::new(Mutex::new(ScriptedCamera::new(vec![
        Step::Jpeg(JPEG_A),
        Step::Fail,
        Step::Jpeg(JPEG_B),
        Step::Fail,
    ])));
    let encoder = Arc::new(ScriptedEncoder { output: None });
    let telemetry = Arc::new(StreamTelemetry::new(20));

    for _ in 0..2 {
        let session = StreamSession::new(
            Arc::clone(&camera),
            Arc::clone(&encoder),
            Arc::clone(&telemetry),
        );
        let mut sink = RecordingSink::unlimited();
        session.run(&mut sink).await;
        assert!(!telemetry.clock_is_set(), "each exit resets the shared clock");
    }

    assert_eq!(camera.lock().await.released, 2);
}
