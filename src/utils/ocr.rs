/*!
 * OCR input classification
 *
 * Decides whether an uploaded file can go through the OCR pipeline and
 * whether it needs rasterizing first. Magic bytes win over the declared
 * content type, which wins over the file extension.
 */

/// Inputs the OCR pipeline accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrInputKind {
    Pdf,
    Jpeg,
    Png,
}

impl OcrInputKind {
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type.trim().to_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// PDFs are rendered to page images before text detection
    pub fn needs_rasterization(self) -> bool {
        self == Self::Pdf
    }
}

/// Classify an upload for OCR, `None` when the pipeline cannot handle it
pub fn detect_input_kind(data: &[u8], declared_mime: Option<&str>, filename: &str) -> Option<OcrInputKind> {
    if let Some(kind) = infer::get(data) {
        // Recognized bytes are authoritative, even if they say "unsupported"
        return OcrInputKind::from_mime(kind.mime_type());
    }

    declared_mime
        .and_then(OcrInputKind::from_mime)
        .or_else(|| {
            mime_guess::from_path(filename)
                .first()
                .and_then(|mime| OcrInputKind::from_mime(mime.essence_str()))
        })
}

/// Best content type for storing an upload: sniffed bytes, then the
/// declared type, then the filename
pub fn resolve_mime_type(data: &[u8], declared_mime: Option<&str>, filename: &str) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    match declared_mime.map(str::trim) {
        Some(mime) if !mime.is_empty() && mime != "application/octet-stream" => mime.to_string(),
        _ => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}
