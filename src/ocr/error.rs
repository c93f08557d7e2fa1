use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Tesseract is not installed or OCR support was not compiled in")]
    TesseractNotInstalled,

    #[error("OCR engine initialization failed: {details}")]
    InitializationFailed { details: String },

    #[error("Unsupported input format: {details}")]
    InvalidImageFormat { details: String },

    #[error("PDF rasterization failed: {details}")]
    RasterizationFailed { details: String },

    #[error("Text detection failed on page {page}: {details}")]
    DetectionFailed { page: usize, details: String },

    #[error("OCR workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}
