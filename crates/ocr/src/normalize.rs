use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

use crate::pdf::{PdfError, PdfRenderer};

/// Longest edge accepted by the vision service; larger images are
/// downscaled to this before encoding.
const MAX_EDGE_PX: u32 = 1568;
/// Rasterization density for PDF pages.
const PDF_RENDER_DPI: u32 = 200;
/// JPEG re-encode quality.
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error(transparent)]
    Pdf(#[from] PdfError),
}

/// One encoded image ready for the inference service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Base64-encoded JPEG or PNG bytes.
    pub data: String,
    pub media_type: &'static str,
}

/// Convert a source file into inference-ready payloads: one per PDF page
/// (in page order), exactly one for any raster source. PNG input stays
/// PNG; everything else is re-encoded as JPEG after alpha removal.
pub fn prepare_images(
    data: &[u8],
    file_name: &str,
    pdf: &dyn PdfRenderer,
) -> Result<Vec<ImagePayload>, NormalizeError> {
    if extension(file_name) == "pdf" {
        return pdf
            .render_pages(data, PDF_RENDER_DPI)?
            .iter()
            .map(|page| {
                let img = image::load_from_memory(page)?;
                encode_jpeg(downscale(img))
            })
            .collect();
    }

    let img = downscale(image::load_from_memory(data)?);
    let payload = if extension(file_name) == "png" {
        encode_png(img)?
    } else {
        encode_jpeg(img)?
    };
    Ok(vec![payload])
}

fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Shrink so the larger dimension equals [`MAX_EDGE_PX`]; never upscale.
fn downscale(img: DynamicImage) -> DynamicImage {
    if img.width() > MAX_EDGE_PX || img.height() > MAX_EDGE_PX {
        img.resize(MAX_EDGE_PX, MAX_EDGE_PX, FilterType::Lanczos3)
    } else {
        img
    }
}

fn encode_jpeg(img: DynamicImage) -> Result<ImagePayload, NormalizeError> {
    // JPEG has no alpha channel; flatten to RGB first.
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut buf), JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;
    Ok(ImagePayload {
        data: base64::engine::general_purpose::STANDARD.encode(&buf),
        media_type: "image/jpeg",
    })
}

fn encode_png(img: DynamicImage) -> Result<ImagePayload, NormalizeError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;
    Ok(ImagePayload {
        data: base64::engine::general_purpose::STANDARD.encode(&buf),
        media_type: "image/png",
    })
}
