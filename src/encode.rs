//! JPEG re-encoding of raw frames

use crate::camera::{Frame, PixelFormat};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder as ImageCrateEncoder;
use image::ExtendedColorType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("frame is already JPEG-encoded")]
    AlreadyEncoded,

    #[error("payload length {len} does not match {width}x{height} {format:?}")]
    Geometry {
        len: usize,
        width: u32,
        height: u32,
        format: PixelFormat,
    },

    #[error("JPEG encoder error: {0}")]
    Codec(#[from] image::ImageError),
}

/// Encoder interface: raw frame in, JPEG bytes out.
pub trait JpegEncoder {
    fn encode(&self, frame: &Frame) -> Result<Bytes, EncodeError>;
}

/// JPEG encoder backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageJpegEncoder {
    quality: u8,
}

impl ImageJpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }
}

impl JpegEncoder for ImageJpegEncoder {
    fn encode(&self, frame: &Frame) -> Result<Bytes, EncodeError> {
        let (color, bytes_per_pixel) = match frame.format {
            PixelFormat::Jpeg => return Err(EncodeError::AlreadyEncoded),
            PixelFormat::Rgb888 => (ExtendedColorType::Rgb8, 3),
            PixelFormat::Gray8 => (ExtendedColorType::L8, 1),
        };

        let expected = frame.width as usize * frame.height as usize * bytes_per_pixel;
        if frame.data.len() != expected {
            return Err(EncodeError::Geometry {
                len: frame.data.len(),
                width: frame.width,
                height: frame.height,
                format: frame.format,
            });
        }

        let mut out = Vec::new();
        let mut encoder = ImageCrateEncoder::new_with_quality(&mut out, self.quality);
        encoder.encode(&frame.data, frame.width, frame.height, color)?;

        Ok(Bytes::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FrameTimestamp;

    fn rgb_frame(width: u32, height: u32) -> Frame {
        Frame {
            format: PixelFormat::Rgb888,
            data: Bytes::from(vec![0x40u8; (width * height * 3) as usize]),
            width,
            height,
            timestamp: FrameTimestamp { sec: 0, usec: 0 },
        }
    }

    #[test]
    fn test_encode_rgb888() {
        let encoder = ImageJpegEncoder::new(80);
        let jpeg = encoder.encode(&rgb_frame(16, 16)).unwrap();

        // JPEG SOI marker
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_gray8() {
        let encoder = ImageJpegEncoder::new(80);
        let frame = Frame {
            format: PixelFormat::Gray8,
            data: Bytes::from(vec![0u8, 64, 128, 255]),
            width: 2,
            height: 2,
            timestamp: FrameTimestamp { sec: 0, usec: 0 },
        };

        let jpeg = encoder.encode(&frame).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_rejects_jpeg_input() {
        let encoder = ImageJpegEncoder::new(80);
        let frame = Frame {
            format: PixelFormat::Jpeg,
            data: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
            width: 1,
            height: 1,
            timestamp: FrameTimestamp { sec: 0, usec: 0 },
        };

        assert!(matches!(
            encoder.encode(&frame),
            Err(EncodeError::AlreadyEncoded)
        ));
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let encoder = ImageJpegEncoder::new(80);
        let mut frame = rgb_frame(16, 16);
        frame.data = Bytes::from_static(&[0u8; 8]);

        assert!(matches!(
            encoder.encode(&frame),
            Err(EncodeError::Geometry { .. })
        ));
    }
}
