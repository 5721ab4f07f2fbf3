use thiserror::Error;

/// Upper bound for a single buffered part before the stream is considered
/// corrupt (an ESP32-CAM UXGA frame is well under 1 MiB).
pub const DEFAULT_MAX_PART_SIZE: usize = 8 * 1024 * 1024;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

#[derive(Error, Debug)]
pub enum MjpegError {
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("stream read failed: {0}")]
    Io(#[source] std::io::Error),
    #[error("stream closed by server")]
    Closed,
    #[error("stream is not open")]
    NotOpen,
    #[error("multipart part exceeds {limit} bytes")]
    PartTooLarge { limit: usize },
    #[error("JPEG decode failed: {0}")]
    Decode(#[source] image::ImageError),
}

/// Incremental splitter for `multipart/x-mixed-replace` JPEG streams.
///
/// Bytes are pushed as they arrive from the network; complete JPEG payloads
/// are pulled out with [`next_part`](Self::next_part). A part is delimited by
/// its `Content-Length` header when the camera sends one, otherwise by the
/// JPEG start/end-of-image markers. Boundary lines and other part headers
/// are skipped.
///
/// A part over `max_part_size` is reported as [`MjpegError::PartTooLarge`]
/// and its start marker discarded, so the next call resynchronises on the
/// following part.
pub struct MjpegParser {
    buf: Vec<u8>,
    max_part_size: usize,
}

impl MjpegParser {
    pub fn new(max_part_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_part_size,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete JPEG payload, or `None` if more bytes are
    /// needed.
    pub fn next_part(&mut self) -> Result<Option<Vec<u8>>, MjpegError> {
        let Some(soi) = find(&self.buf, &SOI, 0) else {
            return self.check_overflow(0).map(|_| None);
        };

        if let Some(len) = content_length(&self.buf[..soi]) {
            if len > self.max_part_size {
                self.buf.drain(..soi + SOI.len());
                return Err(MjpegError::PartTooLarge {
                    limit: self.max_part_size,
                });
            }
            if self.buf.len() < soi + len {
                return Ok(None);
            }
            let part = self.buf[soi..soi + len].to_vec();
            self.buf.drain(..soi + len);
            return Ok(Some(part));
        }

        match find(&self.buf, &EOI, soi + SOI.len()) {
            Some(eoi) => {
                let end = eoi + EOI.len();
                let part = self.buf[soi..end].to_vec();
                self.buf.drain(..end);
                Ok(Some(part))
            }
            None => self.check_overflow(soi).map(|_| None),
        }
    }

    fn check_overflow(&mut self, part_start: usize) -> Result<(), MjpegError> {
        if self.buf.len() - part_start > self.max_part_size {
            match find(&self.buf, &SOI, part_start) {
                Some(soi) => {
                    self.buf.drain(..soi + SOI.len());
                }
                None => self.buf.clear(),
            }
            return Err(MjpegError::PartTooLarge {
                limit: self.max_part_size,
            });
        }
        Ok(())
    }
}

impl Default for MjpegParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PART_SIZE)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Last `Content-Length` header in the bytes preceding a part body.
fn content_length(headers: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(headers)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .filter_map(|(_, value)| value.trim().parse().ok())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_like(body: &[u8]) -> Vec<u8> {
        let mut v = SOI.to_vec();
        v.extend_from_slice(body);
        v.extend_from_slice(&EOI);
        v
    }

    fn part_with_length(boundary: &str, payload: &[u8]) -> Vec<u8> {
        let mut v = format!(
            "--{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nX-Timestamp: 1.000\r\n\r\n",
            payload.len()
        )
        .into_bytes();
        v.extend_from_slice(payload);
        v.extend_from_slice(b"\r\n");
        v
    }

    fn part_without_length(payload: &[u8]) -> Vec<u8> {
        let mut v = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        v.extend_from_slice(payload);
        v.extend_from_slice(b"\r\n");
        v
    }

    #[test]
    fn test_part_with_content_length() {
        let payload = jpeg_like(&[1, 2, 3]);
        let mut parser = MjpegParser::default();
        parser.push(&part_with_length("123456789000000000000987654321", &payload));
        assert_eq!(parser.next_part().unwrap(), Some(payload));
        assert_eq!(parser.next_part().unwrap(), None);
    }

    #[test]
    fn test_part_without_content_length_uses_markers() {
        let payload = jpeg_like(&[9, 8, 7, 6]);
        let mut parser = MjpegParser::default();
        parser.push(&part_without_length(&payload));
        assert_eq!(parser.next_part().unwrap(), Some(payload));
    }

    #[test]
    fn test_content_length_keeps_embedded_eoi() {
        // Embedded thumbnail ends with its own EOI before the real one.
        let payload = jpeg_like(&[0x10, 0xFF, 0xD9, 0x20]);
        let mut parser = MjpegParser::default();
        parser.push(&part_with_length("frame", &payload));
        assert_eq!(parser.next_part().unwrap(), Some(payload));
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let first = jpeg_like(&[1; 32]);
        let second = jpeg_like(&[2; 16]);
        let mut stream = part_with_length("frame", &first);
        stream.extend(part_with_length("frame", &second));

        let mut parser = MjpegParser::default();
        let mut parts = Vec::new();
        for byte in stream {
            parser.push(&[byte]);
            while let Some(part) = parser.next_part().unwrap() {
                parts.push(part);
            }
        }
        assert_eq!(parts, vec![first, second]);
    }

    #[test]
    fn test_two_parts_in_one_push() {
        let a = jpeg_like(&[0xAA]);
        let b = jpeg_like(&[0xBB]);
        let mut stream = part_without_length(&a);
        stream.extend(part_without_length(&b));

        let mut parser = MjpegParser::default();
        parser.push(&stream);
        assert_eq!(parser.next_part().unwrap(), Some(a));
        assert_eq!(parser.next_part().unwrap(), Some(b));
        assert_eq!(parser.next_part().unwrap(), None);
    }

    #[test]
    fn test_incomplete_part_waits_for_more_bytes() {
        let payload = jpeg_like(&[5; 10]);
        let full = part_with_length("frame", &payload);
        let (head, tail) = full.split_at(full.len() - 6);

        let mut parser = MjpegParser::default();
        parser.push(head);
        assert_eq!(parser.next_part().unwrap(), None);
        parser.push(tail);
        assert_eq!(parser.next_part().unwrap(), Some(payload));
    }

    #[test]
    fn test_garbage_without_marker_overflows() {
        let mut parser = MjpegParser::new(16);
        parser.push(&[0x41; 17]);
        assert!(matches!(
            parser.next_part(),
            Err(MjpegError::PartTooLarge { limit: 16 })
        ));
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_declared_length_over_limit_is_rejected() {
        let mut parser = MjpegParser::new(4);
        parser.push(&part_with_length("frame", &jpeg_like(&[0; 8])));
        assert!(matches!(
            parser.next_part(),
            Err(MjpegError::PartTooLarge { .. })
        ));
    }

    #[test]
    fn test_stream_resumes_after_oversized_part() {
        let big = jpeg_like(&[0; 64]);
        let small = jpeg_like(&[7; 4]);
        let mut stream = part_with_length("frame", &big);
        stream.extend(part_with_length("frame", &small));

        let mut parser = MjpegParser::new(32);
        parser.push(&stream);
        assert!(matches!(
            parser.next_part(),
            Err(MjpegError::PartTooLarge { limit: 32 })
        ));
        assert_eq!(parser.next_part().unwrap(), Some(small));
    }

    #[test]
    fn test_unterminated_part_overflow_skips_its_marker() {
        let mut parser = MjpegParser::new(16);
        let mut unterminated = SOI.to_vec();
        unterminated.extend_from_slice(&[0; 16]);
        parser.push(&part_without_length(&unterminated));
        assert!(parser.next_part().is_err());

        let next = jpeg_like(&[3]);
        parser.push(&part_without_length(&next));
        assert_eq!(parser.next_part().unwrap(), Some(next));
    }

    #[test]
    fn test_reset_discards_buffer() {
        let mut parser = MjpegParser::default();
        parser.push(&[0xFF, 0xD8, 1, 2]);
        parser.reset();
        assert_eq!(parser.buffered(), 0);
        assert_eq!(parser.next_part().unwrap(), None);
    }

    #[test]
    fn test_content_length_parsing() {
        assert_eq!(content_length(b"content-length:  42 \r\n\r\n"), Some(42));
        assert_eq!(content_length(b"Content-Type: image/jpeg\r\n\r\n"), None);
        assert_eq!(content_length(b"Content-Length: abc\r\n"), None);
    }
}
