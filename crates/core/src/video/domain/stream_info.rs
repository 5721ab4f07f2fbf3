/// What the camera told us when the stream was opened.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub url: String,
    pub content_type: Option<String>,
    /// Multipart boundary without the leading `--`.
    pub boundary: Option<String>,
}

impl StreamInfo {
    pub fn is_multipart(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/"))
    }
}
