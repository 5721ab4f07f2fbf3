//! `multipart/x-mixed-replace` framing shared by the stream reader and the
//! chunk producer.

/// Boundary token announced to clients; parts are delimited by `--frame`.
pub const BOUNDARY: &str = "frame";

pub const PART_CONTENT_TYPE: &str = "image/jpeg";

pub const CRLF: &[u8] = b"\r\n";

/// Value for the HTTP `Content-Type` header of the served stream.
pub fn stream_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={BOUNDARY}")
}

/// Wraps one JPEG payload as a multipart part:
/// `--frame\r\nContent-Type: image/jpeg\r\n\r\n<jpeg>\r\n`.
pub fn frame_part(jpeg: &[u8]) -> Vec<u8> {
    part(jpeg, PART_CONTENT_TYPE)
}

/// Wraps an arbitrary payload as a multipart part with the given type.
pub fn part(payload: &[u8], content_type: &str) -> Vec<u8> {
    let header = format!("--{BOUNDARY}\r\nContent-Type: {content_type}\r\n\r\n");
    let mut part = Vec::with_capacity(header.len() + payload.len() + CRLF.len());
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(payload);
    part.extend_from_slice(CRLF);
    part
}

/// Extracts the `boundary=` parameter from a multipart content type,
/// stripping optional quotes and a leading `--` some cameras include.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').map(str::trim).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        let value = value.strip_prefix("--").unwrap_or(value);
        (!value.is_empty()).then(|| value.to_string())
    })
}
