//! I/O helpers for 8-bit images and JSON.
//!
//! - `load_image`: read a PNG/JPEG into an owned gray or RGB buffer.
//! - `save_image`: write an owned 1- or 3-channel buffer to disk.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::{ImageBufU8, ImageView};
use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Channel layout requested when decoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Gray,
    Rgb,
}

impl ColorMode {
    pub fn channels(self) -> usize {
        match self {
            ColorMode::Gray => 1,
            ColorMode::Rgb => 3,
        }
    }
}

/// Load an image from disk converted to the requested layout.
pub fn load_image(path: &Path, mode: ColorMode) -> Result<ImageBufU8, String> {
    let img = image::open(path).map_err(|e| format!("Failed to open {}: {e}", path.display()))?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    let data = match mode {
        ColorMode::Gray => img.into_luma8().into_raw(),
        ColorMode::Rgb => img.into_rgb8().into_raw(),
    };
    ImageBufU8::from_raw(width, height, mode.channels(), data)
        .ok_or_else(|| format!("Decoded {} has an unexpected size", path.display()))
}

/// Save a 1- or 3-channel buffer; the format follows the file extension.
pub fn save_image(buffer: &ImageBufU8, path: &Path) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let (w, h) = (buffer.width() as u32, buffer.height() as u32);
    let data = buffer.data().to_vec();
    let dynamic = match buffer.channels() {
        1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        n => return Err(format!("Cannot save an image with {n} channels")),
    }
    .ok_or_else(|| "Failed to create image buffer".to_string())?;
    dynamic
        .save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
