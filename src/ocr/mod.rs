pub mod amount;
pub mod detector;
pub mod error;
pub mod rasterize;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

use crate::ocr::{detector::TextDetector, error::OcrError, rasterize::Rasterizer};
use crate::utils::ocr::OcrInputKind;

/// Configuration for the OCR pipeline
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Root under which each run creates its scratch directory
    pub temp_dir: PathBuf,
    pub language: String,
    pub raster_dpi: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            language: "eng".to_string(),
            raster_dpi: 300,
        }
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOutcome {
    pub text: String,
    /// Extracted amount in minor units
    pub amount_cents: Option<i64>,
    pub pages: usize,
}

/// Rasterize (PDF only), detect text page by page, then pick an amount.
///
/// Every run works inside its own temporary directory. The upload copy and
/// all page images live there and are removed when the run ends, whatever
/// the outcome.
pub struct OcrPipeline {
    rasterizer: Arc<dyn Rasterizer>,
    detector: Arc<dyn TextDetector>,
    temp_root: PathBuf,
}

impl OcrPipeline {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, detector: Arc<dyn TextDetector>, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            rasterizer,
            detector,
            temp_root: temp_root.into(),
        }
    }

    /// Pipeline backed by `pdftoppm` and Tesseract
    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            Arc::new(rasterize::PdftoppmRasterizer::new(config.raster_dpi)),
            Arc::new(detector::TesseractDetector::new(config.language.clone())),
            config.temp_dir.clone(),
        )
    }

    pub async fn process(&self, kind: OcrInputKind, data: &[u8]) -> Result<OcrOutcome, OcrError> {
        tokio::fs::create_dir_all(&self.temp_root).await?;
        let workspace = tempfile::Builder::new().prefix("ocr-").tempdir_in(&self.temp_root)?;

        let result = self.run_in(workspace.path(), kind, data).await;

        // Dropping the guard would also remove it; closing reports failures
        if let Err(e) = workspace.close() {
            tracing::warn!("Failed to remove OCR workspace: {}", e);
        }

        result
    }

    async fn run_in(&self, workspace: &Path, kind: OcrInputKind, data: &[u8]) -> Result<OcrOutcome, OcrError> {
        let input = workspace.join(format!("input.{}", kind.extension()));
        tokio::fs::write(&input, data).await?;

        let pages = if kind.needs_rasterization() {
            let out_dir = workspace.join("pages");
            tokio::fs::create_dir(&out_dir).await?;
            self.rasterizer.rasterize(&input, &out_dir).await?
        } else {
            vec![input]
        };
        debug!("OCR input has {} page(s)", pages.len());

        let mut page_texts = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let text = self.detector.detect(page).await.map_err(|e| match e {
                OcrError::DetectionFailed { details, .. } => OcrError::DetectionFailed {
                    page: index + 1,
                    details,
                },
                other => other,
            })?;
            page_texts.push(text);
        }

        let text = page_texts.join("\n");
        let amount_cents = amount::extract_amount(&text);
        info!(
            pages = pages.len(),
            chars = text.len(),
            amount_found = amount_cents.is_some(),
            "OCR extraction finished"
        );

        Ok(OcrOutcome {
            text,
            amount_cents,
            pages: pages.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes `count` fake page images and reports them
    struct FakeRasterizer {
        count: usize,
    }

    #[async_trait]
    impl Rasterizer for FakeRasterizer {
        async fn rasterize(&self, _pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
            let mut pages = Vec::new();
            for n in 1..=self.count {
                let page = out_dir.join(format!("page-{}.png", n));
                tokio::fs::write(&page, b"png").await?;
                pages.push(page);
            }
            Ok(pages)
        }
    }

    /// Returns scripted text per call; a `None` entry fails that page
    struct ScriptedDetector {
        pages: Mutex<Vec<Option<&'static str>>>,
    }

    impl ScriptedDetector {
        fn new(pages: Vec<Option<&'static str>>) -> Self {
            Self { pages: Mutex::new(pages) }
        }
    }

    #[async_trait]
    impl TextDetector for ScriptedDetector {
        async fn detect(&self, image: &Path) -> Result<String, OcrError> {
            assert!(image.exists(), "page image should exist while detecting");
            let next = self.pages.lock().unwrap().remove(0);
            next.map(str::to_string).ok_or(OcrError::DetectionFailed {
                page: 0,
                details: "engine crashed".to_string(),
            })
        }
    }

    fn pipeline(root: &Path, pages: usize, script: Vec<Option<&'static str>>) -> OcrPipeline {
        OcrPipeline::new(
            Arc::new(FakeRasterizer { count: pages }),
            Arc::new(ScriptedDetector::new(script)),
            root,
        )
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_pdf_pages_joined_in_order() {
        let root = tempfile::tempdir().unwrap();
        let ocr = pipeline(
            root.path(),
            2,
            vec![Some("Subtotal: £45.00"), Some("Total Due: £120.00")],
        );

        let outcome = ocr.process(OcrInputKind::Pdf, b"%PDF-1.4").await.unwrap();
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.text, "Subtotal: £45.00\nTotal Due: £120.00");
        assert_eq!(outcome.amount_cents, Some(12_000));
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_image_skips_rasterization() {
        let root = tempfile::tempdir().unwrap();
        let ocr = pipeline(root.path(), 5, vec![Some("Thank you")]);

        let outcome = ocr.process(OcrInputKind::Png, b"png").await.unwrap();
        assert_eq!(outcome.pages, 1);
        assert_eq!(outcome.amount_cents, None);
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_detection_failure_still_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let ocr = pipeline(root.path(), 3, vec![Some("page one"), None, Some("page three")]);

        let err = ocr.process(OcrInputKind::Pdf, b"%PDF-1.4").await.unwrap_err();
        match err {
            OcrError::DetectionFailed { page, .. } => assert_eq!(page, 2),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_rasterization_failure_still_cleans_up() {
        struct BrokenRasterizer;

        #[async_trait]
        impl Rasterizer for BrokenRasterizer {
            async fn rasterize(&self, _pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
                tokio::fs::write(out_dir.join("page-1.png"), b"partial").await?;
                Err(OcrError::RasterizationFailed {
                    details: "corrupt xref table".to_string(),
                })
            }
        }

        let root = tempfile::tempdir().unwrap();
        let ocr = OcrPipeline::new(
            Arc::new(BrokenRasterizer),
            Arc::new(ScriptedDetector::new(vec![])),
            root.path(),
        );

        let err = ocr.process(OcrInputKind::Pdf, b"%PDF").await.unwrap_err();
        assert!(matches!(err, OcrError::RasterizationFailed { .. }));
        assert!(is_empty_dir(root.path()));
    }
}
