//! Derived image processor
//!
//! Produces the on-disk image for a file/filter pair:
//! - decode the uploaded original once
//! - apply the filter chain in order
//! - write to a temp file next to the target, then rename it into place
//!
//! The rename means a reader never sees a half-written derived image, and
//! two requests regenerating the same pair just replace each other's
//! complete result.

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use log::debug;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::state::filter::FilterEffect;

/// Derive `target` from `original` by applying `chain`.
///
/// Returns the resolution (width, height) of the written image.
pub fn derive_image(original: &Path, chain: &[FilterEffect], target: &Path) -> Result<(u32, u32)> {
    let img = image::open(original)?;
    debug!(
        "Deriving {} from {} ({}x{}, {} effects)",
        target.display(),
        original.display(),
        img.width(),
        img.height(),
        chain.len()
    );

    let derived = apply_chain(img, chain);
    write_atomic(&derived, target)?;

    Ok((derived.width(), derived.height()))
}

/// Apply every effect of the chain, in order
pub fn apply_chain(img: DynamicImage, chain: &[FilterEffect]) -> DynamicImage {
    chain.iter().fold(img, |img, effect| apply_effect(img, effect))
}

fn apply_effect(img: DynamicImage, effect: &FilterEffect) -> DynamicImage {
    match *effect {
        // `resize` would also scale up, originals already inside the box stay
        FilterEffect::Thumbnail { width, height } => {
            if img.width() <= width && img.height() <= height {
                img
            } else {
                img.resize(width, height, FilterType::Lanczos3)
            }
        }
        FilterEffect::Resize { width, height } => img.resize_exact(width, height, FilterType::Lanczos3),
        FilterEffect::Crop { width, height } => img.resize_to_fill(width, height, FilterType::Lanczos3),
        FilterEffect::Grayscale => img.grayscale(),
    }
}

/// Encode in the format the target's extension names and rename into place
fn write_atomic(img: &DynamicImage, target: &Path) -> Result<()> {
    let format = ImageFormat::from_path(target)?;
    let dir = target
        .parent()
        .ok_or_else(|| Error::Config(format!("{} has no parent folder", target.display())))?;

    // JPEG has no alpha channel
    let rgb;
    let img = if format == ImageFormat::Jpeg {
        rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        &rgb
    } else {
        img
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        img.write_to(&mut writer, format)?;
        writer.flush()?;
    }
    tmp.persist(target).map_err(|e| Error::Io(e.error))?;

    Ok(())
}
