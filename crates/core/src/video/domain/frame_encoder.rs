use crate::shared::frame::Frame;

/// Compresses a frame into a self-contained image payload.
pub trait FrameEncoder: Send {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// MIME type of the produced payload.
    fn content_type(&self) -> &'static str;
}
