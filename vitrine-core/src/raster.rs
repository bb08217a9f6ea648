use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use image::DynamicImage;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};

use crate::entities::PageNumber;

const PDF_POINTS_PER_INCH: f32 = 72.0;

/// 1-based page selection parsed from strings like `"1-5"`, `"3"` or
/// `"1,3,5-7"`. Stored as sorted, deduplicated 0-based indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRange(Vec<usize>);

impl PageRange {
    pub fn parse(range: &str) -> anyhow::Result<Self> {
        let mut pages = Vec::new();
        for part in range.split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let start: usize = start.trim().parse().context("invalid range start")?;
                let end: usize = end.trim().parse().context("invalid range end")?;
                if start == 0 || end < start {
                    anyhow::bail!("invalid page range {part:?}: pages are 1-based and end must be >= start");
                }
                pages.extend(start - 1..end);
            } else {
                let page: usize = part.parse().with_context(|| format!("invalid page number {part:?}"))?;
                if page == 0 {
                    anyhow::bail!("page numbers are 1-based");
                }
                pages.push(page - 1);
            }
        }
        pages.sort_unstable();
        pages.dedup();
        Ok(Self(pages))
    }

    /// 0-based indices that exist in a document of `total` pages.
    pub fn indices(&self, total: usize) -> Vec<usize> {
        self.0.iter().copied().filter(|&p| p < total).collect()
    }
}

impl FromStr for PageRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Document rasterization collaborator.
pub trait Rasterize {
    /// Render the selected pages (all pages when `range` is `None`) as
    /// raster images, in page order, with 1-based page numbers.
    fn render_pages(
        &self,
        path: &Path,
        range: Option<&PageRange>,
    ) -> anyhow::Result<Vec<(PageNumber, DynamicImage)>>;

    /// Plain text of the first `max_pages` pages.
    fn extract_text(&self, path: &Path, max_pages: usize) -> anyhow::Result<String>;
}

/// Pdfium-backed rasterizer, bound to the system pdfium library.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
    scale: f32,
}

impl PdfiumRasterizer {
    pub fn new(render_dpi: u32) -> anyhow::Result<Self> {
        let bindings = Pdfium::bind_to_system_library()
            .context("can't bind to the system pdfium library")?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
            scale: render_dpi as f32 / PDF_POINTS_PER_INCH,
        })
    }
}

impl Rasterize for PdfiumRasterizer {
    fn render_pages(
        &self,
        path: &Path,
        range: Option<&PageRange>,
    ) -> anyhow::Result<Vec<(PageNumber, DynamicImage)>> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .with_context(|| format!("can't open {}", path.display()))?;
        let pages: Vec<_> = document.pages().iter().enumerate().collect();
        anyhow::ensure!(!pages.is_empty(), "document has no pages");

        let selected: Vec<usize> = match range {
            Some(range) => range.indices(pages.len()),
            None => (0..pages.len()).collect(),
        };
        anyhow::ensure!(
            !selected.is_empty(),
            "page range selects no pages of a {}-page document",
            pages.len()
        );

        let render_config = PdfRenderConfig::default().scale_page_by_factor(self.scale);
        let mut images = Vec::with_capacity(selected.len());
        for (idx, page) in pages {
            if !selected.contains(&idx) {
                continue;
            }
            let image = page
                .render_with_config(&render_config)
                .map(|bitmap| bitmap.as_image())
                .with_context(|| format!("can't render page {}", idx + 1))?;
            images.push((idx + 1, image));
        }
        tracing::debug!(
            pages = images.len(),
            doc = %path.display(),
            "rendered document pages"
        );
        Ok(images)
    }

    fn extract_text(&self, path: &Path, max_pages: usize) -> anyhow::Result<String> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .with_context(|| format!("can't open {}", path.display()))?;
        let mut text = String::new();
        for page in document.pages().iter().take(max_pages) {
            text.push_str(&page.text()?.all());
            text.push('\n');
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_page() {
        assert_eq!(PageRange::parse("3").unwrap(), PageRange(vec![2]));
    }

    #[test]
    fn test_parse_span() {
        assert_eq!(PageRange::parse("1-5").unwrap(), PageRange(vec![0, 1, 2, 3, 4]));
    }

    #[test]
    fn test_parse_mixed_sorted_deduped() {
        assert_eq!(
            PageRange::parse("5, 1, 3-5").unwrap(),
            PageRange(vec![0, 2, 3, 4])
        );
    }

    #[test]
    fn test_parse_rejects_zero_and_backwards() {
        assert!(PageRange::parse("0").is_err());
        assert!(PageRange::parse("5-2").is_err());
        assert!(PageRange::parse("abc").is_err());
    }

    #[test]
    fn test_indices_drop_out_of_range_pages() {
        let range = PageRange::parse("1,3,9").unwrap();
        assert_eq!(range.indices(4), vec![0, 2]);
        assert_eq!(range.indices(1), vec![0]);
    }
}
