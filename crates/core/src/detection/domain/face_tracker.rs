use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Follows a single region from frame to frame without re-detecting it.
pub trait FaceTracker: Send {
    /// Starts (or restarts) tracking `region` as it appears in `frame`.
    fn start(&mut self, frame: &Frame, region: &Region) -> Result<(), Box<dyn std::error::Error>>;

    /// Locates the target in `frame` and returns the match quality.
    /// Higher is better; 0.0 means nothing usable was found.
    fn update(&mut self, frame: &Frame) -> f64;

    /// Position found by the last `start` or `update`.
    fn position(&self) -> Region;
}
