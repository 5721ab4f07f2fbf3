use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::shared::constants::DEFAULT_JPEG_QUALITY;
use crate::shared::frame::Frame;
use crate::video::domain::frame_encoder::FrameEncoder;

/// Baseline JPEG encoding through the `image` crate.
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// `quality` is clamped to the codec's 1..=100 range.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let mut out = Vec::with_capacity(frame.data().len() / 8);
        ImageJpegEncoder::new_with_quality(&mut out, self.quality).write_image(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }

    fn content_type(&self) -> &'static str {
        "image/jpeg"
    }
}
