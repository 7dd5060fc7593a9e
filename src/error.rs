use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// The shell could not hand out an icon for a path.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("path does not exist: {}", .0.display())]
    NotFound(PathBuf),
    /// Existence could not be checked, e.g. a parent directory is unreadable.
    #[error("cannot access {}: {source}", .path.display())]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid path {path:?}: {source}")]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no shell icon for {}: {reason}", .path.display())]
    NoIcon { path: PathBuf, reason: String },
    #[error("shell icon lookup is not supported on this platform")]
    Unsupported,
}

/// Native step at which bitmap extraction stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionStep {
    IconInfo,
    BitmapInfo,
    SurfaceSetup,
    PixelRead,
}

impl fmt::Display for ExtractionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionStep::IconInfo => "icon-info",
            ExtractionStep::BitmapInfo => "bitmap-info",
            ExtractionStep::SurfaceSetup => "surface-setup",
            ExtractionStep::PixelRead => "pixel-read",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{step}: {detail}")]
pub struct ExtractionError {
    pub step: ExtractionStep,
    pub detail: String,
}

impl ExtractionError {
    pub fn new(step: ExtractionStep, detail: impl Into<String>) -> Self {
        Self {
            step,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("cannot encode an empty {width}x{height} raster")]
    EmptyRaster { width: u32, height: u32 },
    #[error("png encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Any failure of the resolve, extract, encode pipeline.
#[derive(Debug, Error)]
pub enum IconError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}
