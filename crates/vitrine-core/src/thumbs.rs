use crate::error::CatalogError;
use image::imageops::FilterType;
use image::ImageFormat;
use std::fs;
use std::path::Path;

/// Edge length of generated thumbnails (square, cover-cropped).
pub const THUMBNAIL_SIZE: u32 = 400;

/// Derives the thumbnail for `source` at `dest`, creating parent directories
/// as needed. Output is always JPEG regardless of the source format.
pub fn generate_thumbnail(source: &Path, dest: &Path) -> Result<(), CatalogError> {
    let img = image::open(source)?;
    let thumb = img.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    // JPEG has no alpha channel; flatten before encoding.
    thumb
        .into_rgb8()
        .save_with_format(dest, ImageFormat::Jpeg)?;
    Ok(())
}
