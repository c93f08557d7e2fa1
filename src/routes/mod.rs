pub mod documents;
pub mod health;
pub mod ocr;
pub mod swagger;
