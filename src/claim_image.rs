// src/claim_image.rs
//
// Loads an uploaded claim photo into the two forms the pipeline needs:
// raw RGB pixels for local inference, and JPEG bytes for the cloud upload.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// One uploaded vehicle photo, decoded and ready for assessment.
pub struct ClaimImage {
    /// Derived from the upload's file stem; doubles as the report id.
    pub analysis_id: String,
    pub width: usize,
    pub height: usize,
    /// Interleaved RGB, row-major, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
    /// JPEG-encoded copy for network transfer.
    pub jpeg_bytes: Vec<u8>,
}

impl ClaimImage {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read image file: {}", path.display()))?;

        let decoded = image::load_from_memory(&raw)
            .with_context(|| format!("Failed to decode image: {}", path.display()))?;

        let rgb_img = decoded.to_rgb8();
        let (width, height) = rgb_img.dimensions();
        let rgb = rgb_img.into_raw();

        let jpeg_bytes = encode_rgb_to_jpeg(&rgb, width as usize, height as usize)
            .context("Failed to JPEG-encode image for upload")?;

        let analysis_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        debug!(
            "Loaded claim image {} ({}x{}, {} KB jpeg)",
            analysis_id,
            width,
            height,
            jpeg_bytes.len() / 1024
        );

        Ok(Self {
            analysis_id,
            width: width as usize,
            height: height as usize,
            rgb,
            jpeg_bytes,
        })
    }
}

fn encode_rgb_to_jpeg(rgb_data: &[u8], width: usize, height: usize) -> Option<Vec<u8>> {
    use image::{ImageBuffer, RgbImage};

    let img: RgbImage = ImageBuffer::from_raw(width as u32, height as u32, rgb_data.to_vec())?;

    let mut buf = std::io::Cursor::new(Vec::new());
    // Quality 80 is a good balance of size/quality for network transfer
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 80);
    img.write_with_encoder(encoder).ok()?;

    Some(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_encode_round_trips_dimensions() {
        let rgb = vec![128u8; 32 * 24 * 3];
        let jpeg = encode_rgb_to_jpeg(&rgb, 32, 24).expect("encode failed");

        let decoded = image::load_from_memory(&jpeg).expect("decode failed");
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);
    }

    #[test]
    fn test_jpeg_encode_rejects_short_buffer() {
        let rgb = vec![0u8; 10];
        assert!(encode_rgb_to_jpeg(&rgb, 32, 24).is_none());
    }
}
