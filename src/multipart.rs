use bytes::Bytes;
use rand::RngExt;

use crate::media_type::MIME_MULTIPART;

const BOUNDARY_BYTES: usize = 30;

/// Buffered `multipart/form-data` writer.
///
/// Parts are written in call order. The content type carrying the boundary is
/// only handed out by [`MultipartWriter::finish`], after the closing delimiter
/// has been written.
#[derive(Debug)]
pub struct MultipartWriter {
    boundary: String,
    buffer: Vec<u8>,
    parts: usize,
}

impl MultipartWriter {
    pub fn new() -> Self {
        Self::with_boundary(random_boundary())
    }

    pub fn with_boundary(boundary: String) -> Self {
        Self {
            boundary,
            buffer: Vec::new(),
            parts: 0,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn part_count(&self) -> usize {
        self.parts
    }

    pub fn add_field(&mut self, name: &str, value: &[u8]) {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        self.add_part(&[("Content-Disposition", disposition.as_str())], value);
    }

    pub fn add_file(&mut self, field_name: &str, filename: &str, mime_type: &str, data: &[u8]) {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(field_name),
            escape_quotes(filename)
        );
        self.add_part(
            &[
                ("Content-Disposition", disposition.as_str()),
                ("Content-Type", mime_type),
            ],
            data,
        );
    }

    /// Writes one part. Header lines are emitted in the given order.
    pub fn add_part(&mut self, headers: &[(&str, &str)], body: &[u8]) {
        if self.parts > 0 {
            self.buffer.extend_from_slice(b"\r\n");
        }
        self.buffer.extend_from_slice(b"--");
        self.buffer.extend_from_slice(self.boundary.as_bytes());
        self.buffer.extend_from_slice(b"\r\n");
        for (name, value) in headers {
            self.buffer.extend_from_slice(name.as_bytes());
            self.buffer.extend_from_slice(b": ");
            self.buffer.extend_from_slice(value.as_bytes());
            self.buffer.extend_from_slice(b"\r\n");
        }
        self.buffer.extend_from_slice(b"\r\n");
        self.buffer.extend_from_slice(body);
        self.parts += 1;
    }

    /// Closes the writer and returns the payload with its content type, or
    /// `None` when no part was written.
    pub fn finish(mut self) -> Option<(Bytes, String)> {
        if self.parts == 0 {
            return None;
        }
        self.buffer.extend_from_slice(b"\r\n--");
        self.buffer.extend_from_slice(self.boundary.as_bytes());
        self.buffer.extend_from_slice(b"--\r\n");
        let content_type = format!("{MIME_MULTIPART}; boundary={}", self.boundary);
        Some((Bytes::from(self.buffer), content_type))
    }
}

impl Default for MultipartWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// 30 random bytes, hex encoded.
pub fn random_boundary() -> String {
    let random: [u8; BOUNDARY_BYTES] = rand::rng().random();
    random.iter().map(|byte| format!("{byte:02x}")).collect()
}

pub(crate) fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{MultipartWriter, escape_quotes};

    #[test]
    fn random_boundary_is_sixty_hex_chars() {
        let writer = MultipartWriter::new();
        assert_eq!(writer.boundary().len(), 60);
        assert!(writer.boundary().chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_ne!(writer.boundary(), MultipartWriter::new().boundary());
    }

    #[test]
    fn writer_without_parts_has_no_body() {
        assert!(MultipartWriter::new().finish().is_none());
    }

    #[test]
    fn fields_and_files_are_framed_by_boundary() {
        let mut writer = MultipartWriter::with_boundary("xyz".to_owned());
        writer.add_field("name", b"value");
        writer.add_file("file1", "a.txt", "text/plain", b"hello");

        let (body, content_type) = writer.finish().expect("two parts were written");
        assert_eq!(content_type, "multipart/form-data; boundary=xyz");
        assert_eq!(
            std::str::from_utf8(&body).expect("ascii body"),
            "--xyz\r\n\
             Content-Disposition: form-data; name=\"name\"\r\n\r\n\
             value\r\n\
             --xyz\r\n\
             Content-Disposition: form-data; name=\"file1\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             hello\r\n\
             --xyz--\r\n"
        );
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        assert_eq!(escape_quotes(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
