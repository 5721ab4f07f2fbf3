use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::multipart;
use crate::video::domain::frame_encoder::FrameEncoder;
use crate::video::domain::frame_source::FrameSource;

use super::pipeline_logger::PipelineLogger;

/// Wires a camera source through detection and annotation into an
/// MJPEG chunk stream.
///
/// The use case is consumed by [`into_stream`](Self::into_stream); each
/// viewer gets its own instance so detector and tracker state are never
/// shared between connections.
pub struct StreamFacesUseCase {
    source: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    annotator: Box<dyn FrameAnnotator>,
    encoder: Box<dyn FrameEncoder>,
    scale_factor: f64,
    logger: Box<dyn PipelineLogger>,
}

impl StreamFacesUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        annotator: Box<dyn FrameAnnotator>,
        encoder: Box<dyn FrameEncoder>,
        scale_factor: f64,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            source,
            detector,
            annotator,
            encoder,
            scale_factor,
            logger,
        }
    }

    /// Returns the chunk iterator for `url`. Nothing touches the network
    /// until the first `next()`.
    pub fn into_stream(self, url: &str) -> MjpegStream {
        MjpegStream {
            url: url.to_string(),
            use_case: self,
            state: StreamState::Pending,
            emitted: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamState {
    Pending,
    Streaming,
    Finished,
}

/// Infinite sequence of `multipart/x-mixed-replace` parts, one per frame.
///
/// Ends only when the camera can't be opened or a read fails; after that
/// it stays finished.
pub struct MjpegStream {
    url: String,
    use_case: StreamFacesUseCase,
    state: StreamState,
    emitted: usize,
}

impl MjpegStream {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn frames_emitted(&self) -> usize {
        self.emitted
    }

    pub fn is_finished(&self) -> bool {
        self.state == StreamState::Finished
    }

    fn open(&mut self) -> bool {
        log::info!("Attempting to connect to stream at {}", self.url);
        match self.use_case.source.open(&self.url) {
            Ok(info) => {
                self.use_case.logger.info(&format!(
                    "Connected to {} ({})",
                    info.url,
                    info.content_type.as_deref().unwrap_or("no content type")
                ));
                self.state = StreamState::Streaming;
                true
            }
            Err(e) => {
                log::error!("Failed to open stream at {}: {e}", self.url);
                self.finish();
                false
            }
        }
    }

    fn finish(&mut self) {
        if self.state != StreamState::Finished {
            self.use_case.source.close();
            self.state = StreamState::Finished;
            self.use_case.logger.summary();
        }
    }

    fn process(&mut self, frame: Frame) -> Option<Vec<u8>> {
        let uc = &mut self.use_case;

        let mut frame = if uc.scale_factor != 1.0 {
            frame.resized(uc.scale_factor)
        } else {
            frame
        };

        let t0 = Instant::now();
        let regions = match uc.detector.detect(&frame) {
            Ok(regions) => regions,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        };
        uc.logger
            .timing("detect", t0.elapsed().as_secs_f64() * 1000.0);
        uc.logger.metric("faces", regions.len() as f64);

        if !regions.is_empty() {
            let t1 = Instant::now();
            if let Err(e) = uc.annotator.annotate(&mut frame, &regions) {
                log::warn!("Annotation failed on frame {}: {e}", frame.index());
            }
            uc.logger
                .timing("annotate", t1.elapsed().as_secs_f64() * 1000.0);
        }

        let t2 = Instant::now();
        let jpeg = match uc.encoder.encode(&frame) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                log::warn!("Dropping frame {}: encode failed: {e}", frame.index());
                return None;
            }
        };
        uc.logger
            .timing("encode", t2.elapsed().as_secs_f64() * 1000.0);

        Some(multipart::part(&jpeg, uc.encoder.content_type()))
    }
}

impl Iterator for MjpegStream {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.state == StreamState::Pending && !self.open() {
            return None;
        }

        while self.state == StreamState::Streaming {
            let frame = match self.use_case.source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("Failed to capture frame: {e}");
                    self.finish();
                    return None;
                }
            };
            if let Some(chunk) = self.process(frame) {
                self.emitted += 1;
                self.use_case.logger.progress(self.emitted);
                return Some(chunk);
            }
        }
        None
    }
}

impl std::iter::FusedIterator for MjpegStream {}

impl Drop for MjpegStream {
    fn drop(&mut self) {
        if self.state == StreamState::Streaming {
            self.finish();
        }
    }
}
