//! `image` crate backend.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode, orientation tag | `ImageReader::into_decoder` + `ImageDecoder::orientation` |
//! | Resize | `DynamicImage::resize` with `Lanczos3` on the stored pixels, aspect ratio preserved |
//! | Auto-orient | `DynamicImage::apply_orientation` on the resized image |
//! | Temporary output | `tempfile`, next to the source so the final rename stays on one filesystem |
//!
//! Re-encoding never carries metadata over, so `keep_metadata` cannot be
//! honoured here.

use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::path::Path;
use tracing::{debug, trace};

use super::{Converted, ImageConverter, ImagingError, OrientationReader};
use crate::rules::{ResizePlan, is_rotated_exif};

/// Converter and orientation reader backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateBackend;

impl ImageCrateBackend {
    pub fn new() -> Self {
        Self
    }
}

fn decode_error(path: &Path) -> impl FnOnce(image::ImageError) -> ImagingError + '_ {
    move |source| ImagingError::Decode {
        path: path.to_path_buf(),
        source,
    }
}

/// Whether an image of this size fits the plan's limits
fn fits(width: u32, height: u32, plan: &ResizePlan) -> bool {
    plan.max_width.is_none_or(|max| width <= max) && plan.max_height.is_none_or(|max| height <= max)
}

impl ImageConverter for ImageCrateBackend {
    fn convert(&self, source: &Path, plan: &ResizePlan) -> Result<Option<Converted>, ImagingError> {
        let format = ImageFormat::from_path(source).map_err(decode_error(source))?;
        let mut decoder = ImageReader::open(source)?
            .with_guessed_format()?
            .into_decoder()
            .map_err(decode_error(source))?;
        let orientation = decoder.orientation().map_err(decode_error(source))?;
        let img = DynamicImage::from_decoder(decoder).map_err(decode_error(source))?;

        // Limits apply to the stored pixels; rotation happens after resizing
        if fits(img.width(), img.height(), plan) {
            trace!(
                "{} is {}x{}, no conversion necessary",
                source.display(),
                img.width(),
                img.height()
            );
            return Ok(None);
        }

        if !plan.strip_metadata {
            debug!("Metadata of {} is not preserved by re-encoding", source.display());
        }

        let mut resized = img.resize(
            plan.max_width.unwrap_or(u32::MAX),
            plan.max_height.unwrap_or(u32::MAX),
            FilterType::Lanczos3,
        );
        if plan.auto_orient {
            resized.apply_orientation(orientation);
        }
        let resized = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => resized,
        };

        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(".autoresize-")
            .suffix(&format!(".{}", extension))
            .tempfile_in(dir)?
            .into_temp_path();

        resized
            .save_with_format(&temp, format)
            .map_err(|e| ImagingError::Encode {
                path: temp.to_path_buf(),
                source: e,
            })?;

        debug!(
            "Converted {} to {}x{}",
            source.display(),
            resized.width(),
            resized.height()
        );
        Ok(Some(Converted {
            width: resized.width(),
            height: resized.height(),
            temp,
        }))
    }
}

impl OrientationReader for ImageCrateBackend {
    fn is_rotated(&self, path: &Path) -> bool {
        let orientation = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(image::ImageError::from)
            .and_then(|reader| reader.into_decoder())
            .and_then(|mut decoder| decoder.orientation());

        match orientation {
            Ok(orientation) => is_rotated_exif(Some(u16::from(orientation.to_exif()))),
            Err(e) => {
                trace!("No orientation for {}: {}", path.display(), e);
                false
            }
        }
    }
}
