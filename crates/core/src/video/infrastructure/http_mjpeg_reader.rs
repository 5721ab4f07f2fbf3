use std::io::Read;
use std::time::Duration;

use image::ImageFormat;

use crate::shared::frame::Frame;
use crate::shared::multipart::boundary_from_content_type;
use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::stream_info::StreamInfo;

use super::mjpeg_parser::{MjpegError, MjpegParser};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_BUF_SIZE: usize = 16 * 1024;

/// Pulls an MJPEG stream over HTTP and decodes each part to RGB.
///
/// The request has a connect timeout but no overall timeout, since the
/// response body never ends while the camera is healthy.
pub struct HttpMjpegReader {
    client: reqwest::blocking::Client,
    response: Option<reqwest::blocking::Response>,
    parser: MjpegParser,
    read_buf: Vec<u8>,
    next_index: usize,
}

impl HttpMjpegReader {
    pub fn new() -> Result<Self, MjpegError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, MjpegError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .build()
            .map_err(MjpegError::Http)?;
        Ok(Self {
            client,
            response: None,
            parser: MjpegParser::default(),
            read_buf: vec![0u8; READ_BUF_SIZE],
            next_index: 0,
        })
    }

    /// Replaces the per-part size limit (default
    /// [`DEFAULT_MAX_PART_SIZE`](super::mjpeg_parser::DEFAULT_MAX_PART_SIZE)).
    pub fn with_max_part_size(mut self, max_part_size: usize) -> Self {
        self.parser = MjpegParser::new(max_part_size);
        self
    }
}

impl FrameSource for HttpMjpegReader {
    fn open(&mut self, url: &str) -> Result<StreamInfo, Box<dyn std::error::Error>> {
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(MjpegError::Http)?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let info = StreamInfo {
            url: url.to_string(),
            boundary: content_type.as_deref().and_then(boundary_from_content_type),
            content_type,
        };
        if !info.is_multipart() {
            log::warn!(
                "Stream at {url} is not multipart ({}), scanning for JPEG markers",
                info.content_type.as_deref().unwrap_or("no content type")
            );
        }

        self.parser.reset();
        self.next_index = 0;
        self.response = Some(response);
        Ok(info)
    }

    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        let response = self.response.as_mut().ok_or(MjpegError::NotOpen)?;
        loop {
            match self.parser.next_part() {
                Ok(Some(jpeg)) => match decode_jpeg(&jpeg, self.next_index) {
                    Ok(frame) => {
                        self.next_index += 1;
                        return Ok(frame);
                    }
                    Err(e) => {
                        log::warn!("Skipping corrupt part ({} bytes): {e}", jpeg.len());
                        continue;
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Skipping part: {e}");
                    continue;
                }
            }

            let n = response.read(&mut self.read_buf).map_err(MjpegError::Io)?;
            if n == 0 {
                return Err(MjpegError::Closed.into());
            }
            self.parser.push(&self.read_buf[..n]);
        }
    }

    fn close(&mut self) {
        self.response = None;
        self.parser.reset();
    }
}

fn decode_jpeg(bytes: &[u8], index: usize) -> Result<Frame, MjpegError> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(MjpegError::Decode)?;
    Ok(Frame::from_rgb_image(img.to_rgb8(), index))
}
