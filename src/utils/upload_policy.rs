use mime::Mime;

use crate::error::ApiError;

pub const INVALID_TYPE_MESSAGE: &str =
    "Invalid file type. Only PDF, PNG and JPEG files are allowed.";

/// Accepted upload kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Pdf,
    Png,
    Jpeg,
}

impl UploadKind {
    pub fn from_mime(mime: &Mime) -> Option<Self> {
        match mime.essence_str().to_ascii_lowercase().as_str() {
            "application/pdf" => Some(UploadKind::Pdf),
            "image/png" => Some(UploadKind::Png),
            "image/jpeg" | "image/jpg" => Some(UploadKind::Jpeg),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            UploadKind::Pdf => "application/pdf",
            UploadKind::Png => "image/png",
            UploadKind::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            UploadKind::Pdf => "pdf",
            UploadKind::Png => "png",
            UploadKind::Jpeg => "jpg",
        }
    }

    fn magic(self) -> &'static [u8] {
        match self {
            UploadKind::Pdf => b"%PDF",
            UploadKind::Png => &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
            UploadKind::Jpeg => &[0xFF, 0xD8, 0xFF],
        }
    }

    /// Leading bytes agree with the declared type
    pub fn matches_content(self, head: &[u8]) -> bool {
        head.starts_with(self.magic())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_bytes: usize,
}

impl UploadPolicy {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn check_type(&self, declared: Option<&Mime>) -> Result<UploadKind, ApiError> {
        declared
            .and_then(UploadKind::from_mime)
            .ok_or_else(|| ApiError::UnsupportedMediaType(INVALID_TYPE_MESSAGE.to_string()))
    }

    /// Called with the running byte count while the file streams in
    pub fn check_size(&self, received: usize) -> Result<(), ApiError> {
        if received > self.max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "File too large. Maximum size is {}.",
                human_size(self.max_bytes)
            )));
        }
        Ok(())
    }

    pub fn check_content(&self, kind: UploadKind, data: &[u8]) -> Result<(), ApiError> {
        if data.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }
        if !kind.matches_content(data) {
            return Err(ApiError::UnsupportedMediaType(INVALID_TYPE_MESSAGE.to_string()));
        }
        Ok(())
    }
}

fn human_size(bytes: usize) -> String {
    const MB: usize = 1024 * 1024;
    if bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else {
        format!("{bytes} bytes")
    }
}

/// Keeps only the final path component and drops control characters
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).take(200).collect();
    if cleaned.trim().is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> UploadPolicy {
        UploadPolicy::new(10 * 1024 * 1024)
    }

    #[test]
    fn allow_list_accepts_pdf_png_jpeg() {
        let p = policy();
        assert_eq!(p.check_type(Some(&mime::APPLICATION_PDF)).unwrap(), UploadKind::Pdf);
        assert_eq!(p.check_type(Some(&mime::IMAGE_PNG)).unwrap(), UploadKind::Png);
        assert_eq!(p.check_type(Some(&mime::IMAGE_JPEG)).unwrap(), UploadKind::Jpeg);
    }

    #[test]
    fn disallowed_mime_gets_fixed_error() {
        let p = policy();
        for m in [mime::IMAGE_GIF, mime::TEXT_PLAIN, mime::APPLICATION_OCTET_STREAM] {
            let err = p.check_type(Some(&m)).unwrap_err();
            assert_eq!(err.to_string(), INVALID_TYPE_MESSAGE);
        }
        assert!(p.check_type(None).is_err());
    }

    #[test]
    fn size_cap_is_inclusive() {
        let p = policy();
        assert!(p.check_size(10 * 1024 * 1024).is_ok());
        let err = p.check_size(10 * 1024 * 1024 + 1).unwrap_err();
        assert_eq!(err.to_string(), "File too large. Maximum size is 10 MB.");
    }

    #[test]
    fn content_must_match_declared_type() {
        let p = policy();
        assert!(p.check_content(UploadKind::Pdf, b"%PDF-1.7\n...").is_ok());
        assert!(p.check_content(UploadKind::Png, b"%PDF-1.7\n...").is_err());
        assert!(p.check_content(UploadKind::Jpeg, &[0xFF, 0xD8, 0xFF, 0xE0]).is_ok());
        assert!(matches!(
            p.check_content(UploadKind::Pdf, b""),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn file_names_lose_their_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\cv.pdf"), "cv.pdf");
        assert_eq!(sanitize_file_name(""), "upload");
    }
}
