use image::imageops::{self, FilterType};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::player::scaling::{fit, FitMode};

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("asset not found: {0}")]
    Missing(PathBuf),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A decoded, screen-ready buffer: tightly packed RGB8.
#[derive(Debug, Clone)]
pub struct RgbSurface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decodes an image and prepares it for the surface: RGB conversion,
/// Lanczos resize to the computed layout, and a centered crop when a
/// `Fill` background overflows the screen. Callers treat errors as no-ops
/// that leave current content on screen.
pub fn load_image_surface(
    path: &Path,
    screen: (u32, u32),
    mode: FitMode,
) -> Result<RgbSurface, DisplayError> {
    if !path.exists() {
        return Err(DisplayError::Missing(path.to_path_buf()));
    }

    let decoded = image::open(path)
        .map_err(|source| DisplayError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();

    let layout = fit((decoded.width(), decoded.height()), screen, mode);
    log::info!(
        "Image size adjusted: {}x{} -> {}x{} (screen {}x{}, {:?})",
        decoded.width(),
        decoded.height(),
        layout.target.0,
        layout.target.1,
        screen.0,
        screen.1,
        mode
    );

    let resized = imageops::resize(&decoded, layout.target.0, layout.target.1, FilterType::Lanczos3);

    let final_image = match layout.crop {
        Some(crop) => {
            log::debug!("Background cropped to {}x{}", crop.width, crop.height);
            imageops::crop_imm(&resized, crop.x, crop.y, crop.width, crop.height).to_image()
        }
        None => resized,
    };

    Ok(RgbSurface {
        width: final_image.width(),
        height: final_image.height(),
        pixels: final_image.into_raw(),
    })
}
