use async_trait::async_trait;
use std::path::Path;

use super::error::OcrError;

/// Turns one page image into text
#[async_trait]
pub trait TextDetector: Send + Sync {
    async fn detect(&self, image: &Path) -> Result<String, OcrError>;
}

/// Tesseract-backed detector. The engine call is blocking, so it runs on
/// tokio's blocking pool.
pub struct TesseractDetector {
    language: String,
}

impl TesseractDetector {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

#[async_trait]
impl TextDetector for TesseractDetector {
    async fn detect(&self, image: &Path) -> Result<String, OcrError> {
        #[cfg(feature = "ocr")]
        {
            use tesseract::Tesseract;

            let image = image
                .to_str()
                .ok_or_else(|| OcrError::InvalidImageFormat {
                    details: format!("non UTF-8 path {}", image.display()),
                })?
                .to_string();
            let language = self.language.clone();

            tokio::task::spawn_blocking(move || {
                let mut tesseract = Tesseract::new(None, Some(&language))
                    .map_err(|e| OcrError::InitializationFailed { details: e.to_string() })?
                    .set_image(&image)
                    .map_err(|e| OcrError::InvalidImageFormat { details: e.to_string() })?;

                tesseract.get_text().map_err(|e| OcrError::DetectionFailed {
                    page: 0,
                    details: e.to_string(),
                })
            })
            .await
            .map_err(|e| OcrError::DetectionFailed {
                page: 0,
                details: format!("OCR task panicked: {}", e),
            })?
        }

        #[cfg(not(feature = "ocr"))]
        {
            let _ = (image, &self.language);
            Err(OcrError::TesseractNotInstalled)
        }
    }
}
