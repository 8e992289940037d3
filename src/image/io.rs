//! I/O helpers for page images and JSON reports.
//!
//! - `load_grayscale_image`: read a PNG/JPEG/TIFF into an owned 8-bit gray buffer.
//! - `load_binary_image`: same, thresholded into a [`BinaryImage`].
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::{BinaryImage, GrayImageU8};
use crate::error::{GridError, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image from disk and convert to 8-bit grayscale.
pub fn load_grayscale_image(path: &Path) -> Result<GrayImageU8> {
    let img = image::open(path)
        .map_err(|e| GridError::Io(format!("Failed to open {}: {e}", path.display())))?
        .into_luma8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    Ok(GrayImageU8::new(width, height, img.into_raw()))
}

/// Load an image and binarize it with a global threshold.
pub fn load_binary_image(path: &Path, threshold: u8) -> Result<BinaryImage> {
    let gray = load_grayscale_image(path)?;
    Ok(BinaryImage::from_gray(&gray.as_view(), threshold))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        GridError::Io(format!("Failed to serialize JSON for {}: {e}", path.display()))
    })?;
    fs::write(path, json)
        .map_err(|e| GridError::Io(format!("Failed to write JSON {}: {e}", path.display())))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                GridError::Io(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
    }
    Ok(())
}
