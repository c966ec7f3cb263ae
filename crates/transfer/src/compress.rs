//! Client-side image downsampling applied before transfer.
//!
//! Only runs on an item's first attempt when its batch opts in; retries go
//! back to the original bytes.

use image::GenericImageView;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

/// Error from the compression preprocessor.
///
/// Callers treat this as "use the original bytes", not as an upload
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Downsampling parameters.
#[derive(Debug, Clone)]
pub struct CompressionOptions {
    /// Longest edge of the output image in pixels.
    pub max_edge: u32,
    /// JPEG quality of the re-encoded output (1–100).
    pub quality: u8,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_edge: 2000,
            quality: 80,
        }
    }
}

/// Decodes `data`, scales it so the longest edge is at most
/// `opts.max_edge`, and re-encodes as JPEG at `opts.quality`.
///
/// Images already within bounds are still re-encoded, so the output is
/// always JPEG.
pub fn compress_image(data: &[u8], opts: &CompressionOptions) -> Result<Vec<u8>, CompressError> {
    let img = image::load_from_memory(data)?;
    let img = if img.width().max(img.height()) > opts.max_edge {
        img.resize(opts.max_edge, opts.max_edge, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel.
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, opts.quality);
    encoder.encode_image(&rgb)?;
    Ok(out)
}
