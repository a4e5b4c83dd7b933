//! Image conversion and orientation collaborators.
//!
//! The rule engine only decides *what* to do with an upload. The traits here
//! are the seams to whatever actually decodes, resizes and re-encodes images.
//! [`ImageCrateBackend`] is the production implementation, built on the
//! `image` crate.

mod backend;

pub use backend::ImageCrateBackend;

use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;

use crate::rules::ResizePlan;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A converted image waiting to replace its original
#[derive(Debug)]
pub struct Converted {
    pub width: u32,
    pub height: u32,
    /// Temporary file holding the result, deleted on drop unless persisted
    pub temp: TempPath,
}

/// Resizes an image according to a plan
pub trait ImageConverter {
    /// Convert `source`. Returns `Ok(None)` when no conversion was necessary.
    fn convert(&self, source: &Path, plan: &ResizePlan) -> Result<Option<Converted>, ImagingError>;
}

/// Tells whether an image is stored with a 90°-class rotation
pub trait OrientationReader {
    /// Unreadable files and missing tags count as not rotated
    fn is_rotated(&self, path: &Path) -> bool;
}

/// Move a converted image over its original.
///
/// On failure the original is left untouched and the temporary file is
/// removed.
pub fn replace_original(converted: Converted, original: &Path) -> Result<(), ImagingError> {
    converted
        .temp
        .persist(original)
        .map_err(|e| ImagingError::Replace {
            path: original.to_path_buf(),
            source: e.error,
        })
}
