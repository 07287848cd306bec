use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to load bitmap {path}: {source}")]
    Bitmap {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to read font {path}: {source}")]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font file: {0}")]
    InvalidFont(PathBuf),
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
