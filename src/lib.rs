//! Embedded-style MJPEG camera streaming server
//!
//! The core is the per-connection streaming pipeline: acquire a frame,
//! guarantee it is JPEG (re-encoding raw captures), emit it as one part of
//! a long-lived `multipart/x-mixed-replace` response, release whichever
//! buffer was held, and feed the frame interval into a shared rolling
//! average filter. Around it sit a small control plane (index page,
//! one-shot snapshot, QR status JSON) and a raw-TCP stream plane.
//!
//! # Example
//!
//! ```no_run
//! use qrcam_streamer::stream::{RaFilter, PART_BOUNDARY};
//!
//! let mut filter = RaFilter::new(20);
//! let smoothed = filter.run(33);
//! assert_eq!(smoothed, 33);
//! assert_eq!(PART_BOUNDARY.len(), 30);
//! ```

pub mod camera;
pub mod config;
pub mod encode;
pub mod httpd;
pub mod qr;
pub mod snapshot;
pub mod stream;

// Re-exports for convenience
pub use camera::{
    normalize, CaptureError, Frame, FrameSource, FrameTimestamp, NormalizedFrame, PatternSource,
    PixelFormat,
};
pub use config::Config;
pub use encode::{EncodeError, ImageJpegEncoder, JpegEncoder};
pub use httpd::AppState;
pub use qr::{QrState, QrStatus};
pub use snapshot::DirStore;
pub use stream::{ChunkSink, RaFilter, StreamError, StreamSession, StreamTelemetry, WriteSink};
