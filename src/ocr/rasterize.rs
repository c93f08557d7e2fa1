use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::error::OcrError;

/// Renders every page of a PDF to an image file inside `out_dir`
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Page images in page order
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, OcrError>;
}

/// Rasterizer using poppler's `pdftoppm`
pub struct PdftoppmRasterizer {
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let prefix = out_dir.join("page");

        let output = Command::new("pdftoppm")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(&prefix)
            .output()
            .await
            .map_err(|e| OcrError::RasterizationFailed {
                details: format!("failed to run pdftoppm (is poppler-utils installed?): {}", e),
            })?;

        if !output.status.success() {
            return Err(OcrError::RasterizationFailed {
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let pages = collect_pages(out_dir, "page").await?;
        if pages.is_empty() {
            return Err(OcrError::RasterizationFailed {
                details: "pdftoppm produced no pages".to_string(),
            });
        }
        Ok(pages)
    }
}

/// `pdftoppm` names pages `{prefix}-{n}.png`, zero-padding `n` to the page
/// count's width, so order by the parsed number rather than the name
async fn collect_pages(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, OcrError> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(number) = page_number(&path, prefix) {
            pages.push((number, path));
        }
    }

    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

fn page_number(path: &Path, prefix: &str) -> Option<u32> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(prefix)?.strip_prefix('-')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(Path::new("/tmp/x/page-1.png"), "page"), Some(1));
        assert_eq!(page_number(Path::new("/tmp/x/page-010.png"), "page"), Some(10));
        assert_eq!(page_number(Path::new("/tmp/x/input.pdf"), "page"), None);
        assert_eq!(page_number(Path::new("/tmp/x/page-a.png"), "page"), None);
    }

    #[tokio::test]
    async fn test_collect_pages_orders_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-2.png", "page-1.png", "input.pdf"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let pages = collect_pages(dir.path(), "page").await.unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-2.png", "page-10.png"]);
    }
}
