//! Multipart upload collection and filename validation.

use axum::extract::Multipart;
use facegate_core::allowed_file;
use std::collections::HashMap;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Non-empty filename with an allowed extension.
    pub fn is_acceptable(&self) -> bool {
        !self.filename.is_empty() && allowed_file(&self.filename)
    }
}

/// File parts of a multipart form, keyed by field name. A repeated field
/// keeps its first part.
#[derive(Debug, Default)]
pub struct UploadForm {
    files: HashMap<String, Upload>,
}

impl UploadForm {
    /// Remove and return the upload for `field` if it passes validation.
    pub fn take_valid(&mut self, field: &str) -> Option<Upload> {
        self.files.remove(field).filter(Upload::is_acceptable)
    }

    fn insert(&mut self, field: String, upload: Upload) {
        self.files.entry(field).or_insert(upload);
    }
}

/// Drain a multipart body, keeping parts that declare a filename.
///
/// Parts without a filename are plain form fields and are skipped. A part
/// that fails to read ends collection; whatever was read so far is kept.
pub async fn read_uploads(mut multipart: Multipart) -> UploadForm {
    let mut form = UploadForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "malformed multipart body");
                break;
            }
        };

        let (Some(name), Some(filename)) = (
            field.name().map(str::to_owned),
            field.file_name().map(str::to_owned),
        ) else {
            continue;
        };

        match field.bytes().await {
            Ok(bytes) => {
                tracing::debug!(field = %name, filename = %filename, size = bytes.len(), "upload received");
                form.insert(name, Upload { filename, bytes: bytes.to_vec() });
            }
            Err(err) => {
                tracing::warn!(field = %name, error = %err, "failed to read upload");
                break;
            }
        }
    }

    form
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_valid_filters() {
        let mut form = UploadForm::default();
        form.insert("file".into(), Upload { filename: "x.png".into(), bytes: vec![1] });
        form.insert("other".into(), Upload { filename: "".into(), bytes: vec![1] });
        form.insert("bad".into(), Upload { filename: "x.tiff".into(), bytes: vec![1] });

        assert_eq!(form.take_valid("file").map(|u| u.bytes), Some(vec![1]));
        assert!(form.take_valid("file").is_none());
        assert!(form.take_valid("other").is_none());
        assert!(form.take_valid("bad").is_none());
        assert!(form.take_valid("missing").is_none());
    }

    #[test]
    fn test_repeated_field_keeps_first_part() {
        let mut form = UploadForm::default();
        form.insert("file".into(), Upload { filename: "first.png".into(), bytes: vec![1] });
        form.insert("file".into(), Upload { filename: "second.png".into(), bytes: vec![2] });

        let upload = form.take_valid("file").unwrap();
        assert_eq!(upload.filename, "first.png");
        assert_eq!(upload.bytes, vec![1]);
    }
}
