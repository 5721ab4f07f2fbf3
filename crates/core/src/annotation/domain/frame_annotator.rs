use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for marking detected regions on a frame in place.
pub trait FrameAnnotator: Send {
    fn annotate(
        &self,
        frame: &mut Frame,
        regions: &[Region],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
