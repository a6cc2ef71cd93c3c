use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// A `multipart/form-data` body.
///
/// The form is kept as parts until dispatch so the same descriptor can be
/// encoded again on every retry attempt.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<MultipartPart>,
}

#[derive(Debug, Clone)]
struct MultipartPart {
    name: String,
    filename: Option<String>,
    content_type: String,
    data: Bytes,
}

impl MultipartForm {
    /// Creates a new MultipartForm with a random boundary
    pub fn new() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();

        Self {
            boundary: format!("----FormBoundary{}", suffix),
            parts: Vec::new(),
        }
    }

    /// Adds a text field to the form
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(MultipartPart {
            name: name.to_string(),
            filename: None,
            content_type: mime::TEXT_PLAIN_UTF_8.to_string(),
            data: Bytes::from(value.to_string()),
        });
        self
    }

    /// Adds a file field to the form
    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: Bytes) -> Self {
        self.parts.push(MultipartPart {
            name: name.to_string(),
            filename: Some(filename.to_string()),
            content_type: content_type.to_string(),
            data,
        });
        self
    }

    /// Adds a file field with `application/octet-stream` content type
    pub fn binary(self, name: &str, filename: &str, data: Bytes) -> Self {
        self.file(name, filename, mime::APPLICATION_OCTET_STREAM.as_ref(), data)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Value for the `content-type` header of this form
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", mime::MULTIPART_FORM_DATA, self.boundary)
    }

    /// Encodes the form body
    pub fn build(&self) -> Bytes {
        let mut body = Vec::new();

        for part in &self.parts {
            body.extend_from_slice(b"--");
            body.extend_from_slice(self.boundary.as_bytes());
            body.extend_from_slice(b"\r\n");

            body.extend_from_slice(b"Content-Disposition: form-data; name=\"");
            body.extend_from_slice(part.name.as_bytes());
            body.extend_from_slice(b"\"");

            if let Some(filename) = &part.filename {
                body.extend_from_slice(b"; filename=\"");
                body.extend_from_slice(filename.as_bytes());
                body.extend_from_slice(b"\"");
            }
            body.extend_from_slice(b"\r\n");

            body.extend_from_slice(b"Content-Type: ");
            body.extend_from_slice(part.content_type.as_bytes());
            body.extend_from_slice(b"\r\n\r\n");

            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(b"--");
        body.extend_from_slice(self.boundary.as_bytes());
        body.extend_from_slice(b"--\r\n");

        Bytes::from(body)
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_carries_boundary() {
        let form = MultipartForm::new();
        assert!(form.content_type().starts_with("multipart/form-data; boundary="));
        assert!(form.content_type().ends_with(form.boundary()));
    }

    #[test]
    fn test_build_encodes_parts() {
        let form = MultipartForm::new()
            .text("title", "Quarterly report")
            .file("file", "report.pdf", "application/pdf", Bytes::from_static(b"%PDF"));

        let body = String::from_utf8(form.build().to_vec()).unwrap();
        let boundary = form.boundary();

        assert!(body.contains("Content-Disposition: form-data; name=\"title\"\r\n"));
        assert!(body.contains("Quarterly report\r\n"));
        assert!(body.contains("name=\"file\"; filename=\"report.pdf\""));
        assert!(body.contains("Content-Type: application/pdf\r\n\r\n%PDF\r\n"));
        assert!(body.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn test_build_is_repeatable() {
        let form = MultipartForm::new().text("a", "b");
        assert_eq!(form.build(), form.build());
    }
}
