use crate::shared::frame::Frame;
use crate::video::domain::stream_info::StreamInfo;

/// A live source of decoded camera frames.
///
/// Implementations handle transport and codec details while the pipeline
/// works with the abstract `Frame`. Reads block until a frame is available;
/// an `Err` means the stream is unusable and no further frames will follow.
pub trait FrameSource: Send {
    /// Connects to the stream at `url` and returns what the server announced.
    fn open(&mut self, url: &str) -> Result<StreamInfo, Box<dyn std::error::Error>>;

    /// Blocks for the next complete frame.
    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Releases the connection.
    fn close(&mut self);
}
