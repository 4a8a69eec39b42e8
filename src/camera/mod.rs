//! Frame types and the camera-source contract

pub mod normalize;
pub mod pattern;

pub use normalize::{normalize, NormalizedFrame};
pub use pattern::PatternSource;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera produced no frame")]
    NoFrame,

    #[error("camera device error: {0}")]
    Device(String),
}

/// Pixel encoding of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Already JPEG-compressed by the sensor pipeline
    Jpeg,
    /// Packed 24-bit RGB
    Rgb888,
    /// 8-bit grayscale
    Gray8,
}

/// Capture timestamp, seconds + microseconds since the epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimestamp {
    pub sec: i64,
    pub usec: u32,
}

impl FrameTimestamp {
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: since_epoch.as_secs() as i64,
            usec: since_epoch.subsec_micros(),
        }
    }
}

/// A single in-flight capture.
///
/// The frame belongs to the camera subsystem until it is handed back via
/// [`FrameSource::release`]; `release` consumes the value, so a frame can
/// be returned at most once and cannot be used afterwards.
pub struct Frame {
    pub format: PixelFormat,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub timestamp: FrameTimestamp,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Camera subsystem interface.
///
/// Implementations hand out one frame per `acquire` call and take it back
/// through `release`. Sources backed by a fixed driver-owned buffer pool
/// rely on `release` being called for every acquired frame that was not
/// independently re-encoded.
pub trait FrameSource: Send {
    fn acquire(&mut self) -> impl Future<Output = Result<Frame, CaptureError>> + Send;

    fn release(&mut self, frame: Frame);
}
