//! Synthetic paced frame source
//!
//! Stands in for a sensor pipeline: emits a moving color gradient at the
//! configured rate, either pre-encoded as JPEG or as raw pixels so the
//! re-encode path gets exercised too.

use crate::camera::{CaptureError, Frame, FrameSource, FrameTimestamp, PixelFormat};
use crate::config::CameraConfig;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

pub struct PatternSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    quality: u8,
    ticker: Interval,
    tick: u64,
}

impl PatternSource {
    pub fn new(config: &CameraConfig) -> Self {
        let period = Duration::from_secs(1) / config.fps;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            width: config.width,
            height: config.height,
            format: config.format,
            quality: config.quality,
            ticker,
            tick: 0,
        }
    }

    fn render_rgb(&self) -> Vec<u8> {
        let t = self.tick as u32;
        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push((x.wrapping_add(t) & 0xFF) as u8);
                data.push((y.wrapping_add(t) & 0xFF) as u8);
                data.push((t.wrapping_mul(3) & 0xFF) as u8);
            }
        }
        data
    }

    fn render_gray(&self) -> Vec<u8> {
        let t = self.tick as u32;
        let mut data = Vec::with_capacity((self.width * self.height) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x ^ y).wrapping_add(t) & 0xFF) as u8);
            }
        }
        data
    }

    fn render(&self) -> Result<(Bytes, PixelFormat), CaptureError> {
        match self.format {
            PixelFormat::Rgb888 => Ok((Bytes::from(self.render_rgb()), PixelFormat::Rgb888)),
            PixelFormat::Gray8 => Ok((Bytes::from(self.render_gray()), PixelFormat::Gray8)),
            PixelFormat::Jpeg => {
                let rgb = self.render_rgb();
                let mut out = Vec::new();
                let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
                encoder
                    .encode(&rgb, self.width, self.height, ExtendedColorType::Rgb8)
                    .map_err(|e| CaptureError::Device(e.to_string()))?;
                Ok((Bytes::from(out), PixelFormat::Jpeg))
            }
        }
    }
}

impl FrameSource for PatternSource {
    async fn acquire(&mut self) -> Result<Frame, CaptureError> {
        self.ticker.tick().await;

        let (data, format) = self.render()?;
        self.tick = self.tick.wrapping_add(1);

        Ok(Frame {
            format,
            data,
            width: self.width,
            height: self.height,
            timestamp: FrameTimestamp::now(),
        })
    }

    fn release(&mut self, frame: Frame) {
        drop(frame);
    }
}
