use thiserror::Error;

use crate::view::ViewId;

#[derive(Error, Debug)]
pub enum StitchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to load image for {view}: {reason}")]
    ImageLoad { view: ViewId, reason: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown view {0}")]
    MissingView(ViewId),

    #[error("Operation cancelled by the user")]
    Cancelled,

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Global optimization failed: {0}")]
    Solver(String),
}

pub type Result<T> = std::result::Result<T, StitchError>;
