//! Frame normalization: guarantee JPEG payloads, track buffer ownership
//!
//! A captured frame is either already JPEG (the camera keeps owning its
//! buffer) or raw (a new heap buffer is produced and the original goes
//! straight back to the camera). The two release paths are encoded in the
//! [`NormalizedFrame`] payload variants, and `release` consumes the value,
//! so every normalized frame is released exactly once.

use crate::camera::{Frame, FrameSource, FrameTimestamp, PixelFormat};
use crate::encode::{EncodeError, JpegEncoder};
use bytes::Bytes;

enum JpegPayload {
    /// Untouched camera buffer; must go back via `FrameSource::release`
    CameraOwned(Frame),
    /// Freshly encoded buffer; freed when dropped
    HeapOwned(Bytes),
}

/// A frame guaranteed to carry JPEG bytes, tagged with its release path.
pub struct NormalizedFrame {
    payload: JpegPayload,
    pub timestamp: FrameTimestamp,
}

impl NormalizedFrame {
    pub fn bytes(&self) -> &[u8] {
        match &self.payload {
            JpegPayload::CameraOwned(frame) => &frame.data,
            JpegPayload::HeapOwned(data) => data,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Whether the payload is still the camera's own buffer.
    pub fn is_camera_owned(&self) -> bool {
        matches!(self.payload, JpegPayload::CameraOwned(_))
    }

    /// Hands the payload back: camera-owned buffers return to the source,
    /// re-encoded buffers are dropped here.
    pub fn release<C: FrameSource>(self, source: &mut C) {
        match self.payload {
            JpegPayload::CameraOwned(frame) => source.release(frame),
            JpegPayload::HeapOwned(data) => drop(data),
        }
    }
}

/// Ensures `frame` is JPEG, re-encoding when the source format differs.
///
/// Already-JPEG frames pass through without copying. Raw frames are
/// re-encoded into a new buffer and the original is returned to the camera
/// immediately, whether or not encoding succeeded; on encode failure the
/// caller gets the error and holds no buffer.
pub fn normalize<C, E>(
    frame: Frame,
    source: &mut C,
    encoder: &E,
) -> Result<NormalizedFrame, EncodeError>
where
    C: FrameSource,
    E: JpegEncoder,
{
    let timestamp = frame.timestamp;

    if frame.format == PixelFormat::Jpeg {
        return Ok(NormalizedFrame {
            payload: JpegPayload::CameraOwned(frame),
            timestamp,
        });
    }

    let encoded = encoder.encode(&frame);
    source.release(frame);

    Ok(NormalizedFrame {
        payload: JpegPayload::HeapOwned(encoded?),
        timestamp,
    })
}
