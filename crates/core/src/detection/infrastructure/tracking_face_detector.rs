use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_tracker::FaceTracker;
use crate::shared::constants::DEFAULT_TRACKING_QUALITY_THRESHOLD;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Decorator that detects once, then follows the first face with a tracker.
///
/// While searching, every frame goes to the inner detector. The first face
/// it reports seeds the tracker; that frame itself reports no boxes. On
/// later frames only the tracker runs: a quality at or above
/// `quality_threshold` yields the tracked box, anything lower drops the
/// track so the next frame searches again.
pub struct TrackingFaceDetector {
    inner: Box<dyn FaceDetector>,
    tracker: Box<dyn FaceTracker>,
    quality_threshold: f64,
    tracking: bool,
}

impl TrackingFaceDetector {
    pub fn new(
        inner: Box<dyn FaceDetector>,
        tracker: Box<dyn FaceTracker>,
        quality_threshold: f64,
    ) -> Result<Self, &'static str> {
        if !quality_threshold.is_finite() || quality_threshold < 0.0 {
            return Err("quality_threshold must be a non-negative number");
        }
        Ok(Self {
            inner,
            tracker,
            quality_threshold,
            tracking: false,
        })
    }

    pub fn with_default_threshold(
        inner: Box<dyn FaceDetector>,
        tracker: Box<dyn FaceTracker>,
    ) -> Self {
        Self {
            inner,
            tracker,
            quality_threshold: DEFAULT_TRACKING_QUALITY_THRESHOLD,
            tracking: false,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    fn search(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let faces = self.inner.detect(frame)?;
        let Some(first) = faces.into_iter().next() else {
            return Ok(Vec::new());
        };

        match self.tracker.start(frame, &first) {
            Ok(()) => {
                self.tracking = true;
                log::info!("Started tracking face");
            }
            Err(e) => log::warn!("Could not start tracking at {first:?}: {e}"),
        }
        Ok(Vec::new())
    }

    fn follow(&mut self, frame: &Frame) -> Vec<Region> {
        let quality = self.tracker.update(frame);
        if quality >= self.quality_threshold {
            let pos = self.tracker.position();
            log::debug!(
                "Tracking face at position (x={}, y={}, w={}, h={}) quality {quality:.2}",
                pos.x,
                pos.y,
                pos.width,
                pos.height
            );
            vec![pos]
        } else {
            self.tracking = false;
            log::info!("Lost face tracking (quality {quality:.2})");
            Vec::new()
        }
    }
}

impl FaceDetector for TrackingFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        if self.tracking {
            Ok(self.follow(frame))
        } else {
            self.search(frame)
        }
    }
}
