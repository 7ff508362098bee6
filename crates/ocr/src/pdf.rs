use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to load PDF document: {0}")]
    Load(String),
    #[error("Failed to render PDF page {page}: {reason}")]
    Render { page: usize, reason: String },
    #[error("PDF rendering not available — build with `pdfium` feature")]
    NotAvailable,
}

/// Abstraction over a PDF rasterizer.
/// Implementations take raw PDF bytes and return one PNG image per page,
/// in page order, rendered at the requested DPI.
pub trait PdfRenderer: Send + Sync {
    fn render_pages(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<Vec<u8>>, PdfError>;
}

// ── Mock renderer (always available, used for tests) ──────────────────────────

/// Renders a fixed number of synthetic pages — useful for exercising the
/// batch pipeline without the PDFium library installed. Pages are solid
/// gray squares of increasing brightness so page order stays observable
/// after re-encoding.
pub struct MockPdfRenderer {
    pub page_count: usize,
}

impl MockPdfRenderer {
    pub fn new(page_count: usize) -> Self {
        Self { page_count }
    }
}

impl PdfRenderer for MockPdfRenderer {
    fn render_pages(&self, _pdf_bytes: &[u8], _dpi: u32) -> Result<Vec<Vec<u8>>, PdfError> {
        (0..self.page_count)
            .map(|i| {
                let shade = 40 + (i as u8).saturating_mul(20);
                synthetic_page(shade)
                    .map_err(|e| PdfError::Render { page: i, reason: e.to_string() })
            })
            .collect()
    }
}

/// An 8×8 solid-gray PNG.
fn synthetic_page(shade: u8) -> Result<Vec<u8>, image::ImageError> {
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

    let img: GrayImage = ImageBuffer::from_fn(8, 8, |_, _| Luma([shade]));
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Stand-in wired when no rasterizer is configured: every PDF fails
/// with a per-file error instead of being silently skipped.
pub struct UnsupportedPdfRenderer;

impl PdfRenderer for UnsupportedPdfRenderer {
    fn render_pages(&self, _pdf_bytes: &[u8], _dpi: u32) -> Result<Vec<Vec<u8>>, PdfError> {
        Err(PdfError::NotAvailable)
    }
}

// ── PDFium backend (optional, gated behind `pdfium` feature) ──────────────────

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::{PdfError, PdfRenderer};
    use pdfium_render::prelude::*;
    use std::io::Cursor;

    /// PDF points per inch, the unit PDFium reports page sizes in.
    const POINTS_PER_INCH: f32 = 72.0;

    /// Production renderer backed by the PDFium dynamic library.
    ///
    /// Stateless: the library handle is loaded per call because the
    /// upstream `Pdfium` type is `!Send`; the OS caches `dlopen`, so
    /// repeat loads are near-free.
    pub struct PdfiumRenderer;

    impl PdfiumRenderer {
        /// Verify the PDFium library is loadable (fail-fast at startup).
        pub fn new() -> Result<Self, PdfError> {
            let _ = load_pdfium()?;
            Ok(Self)
        }
    }

    /// Load PDFium from `PDFIUM_DYNAMIC_LIB_PATH` if set, otherwise from
    /// the system library search paths.
    fn load_pdfium() -> Result<Pdfium, PdfError> {
        if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
            let bindings = Pdfium::bind_to_library(&path)
                .map_err(|e| PdfError::Load(format!("Failed to load PDFium from {path}: {e}")))?;
            return Ok(Pdfium::new(bindings));
        }
        let bindings = Pdfium::bind_to_system_library().map_err(|e| {
            PdfError::Load(format!(
                "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
            ))
        })?;
        Ok(Pdfium::new(bindings))
    }

    impl PdfRenderer for PdfiumRenderer {
        fn render_pages(&self, pdf_bytes: &[u8], dpi: u32) -> Result<Vec<Vec<u8>>, PdfError> {
            let pdfium = load_pdfium()?;
            let document = pdfium
                .load_pdf_from_byte_slice(pdf_bytes, None)
                .map_err(|e| PdfError::Load(e.to_string()))?;

            let scale = dpi as f32 / POINTS_PER_INCH;
            let mut pages_png = Vec::with_capacity(document.pages().len() as usize);

            for (index, page) in document.pages().iter().enumerate() {
                let width = ((page.width().value * scale).max(1.0)) as i32;
                let height = ((page.height().value * scale).max(1.0)) as i32;
                let config = PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_maximum_height(height);

                let bitmap = page.render_with_config(&config).map_err(|e| PdfError::Render {
                    page: index,
                    reason: e.to_string(),
                })?;

                let mut buf = Vec::new();
                bitmap
                    .as_image()
                    .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                    .map_err(|e| PdfError::Render {
                        page: index,
                        reason: format!("PNG encoding failed: {e}"),
                    })?;

                tracing::debug!(page = index, width, height, "Rendered PDF page");
                pages_png.push(buf);
            }

            Ok(pages_png)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_renders_requested_page_count() {
        let pages = MockPdfRenderer::new(3).render_pages(b"ignored", 200).unwrap();
        assert_eq!(pages.len(), 3);
        for page in &pages {
            assert_eq!(&page[..4], b"\x89PNG");
        }
    }

    #[test]
    fn mock_pages_are_ordered_by_brightness() {
        let pages = MockPdfRenderer::new(3).render_pages(b"", 200).unwrap();
        let shades: Vec<u8> = pages
            .iter()
            .map(|png| image::load_from_memory(png).unwrap().to_luma8().get_pixel(0, 0)[0])
            .collect();
        assert!(shades[0] < shades[1] && shades[1] < shades[2]);
    }

    #[test]
    fn mock_zero_pages() {
        let pages = MockPdfRenderer::new(0).render_pages(b"", 200).unwrap();
        assert!(pages.is_empty());
    }
}
