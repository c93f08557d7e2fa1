pub mod ocr;
pub mod security;
