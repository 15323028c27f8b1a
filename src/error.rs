use thiserror::Error;

/// Contract violations reported by contour tracing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("cannot trace a non-empty cluster on a grid of width 0")]
    ZeroWidth,
    #[error("pixel index {index} is outside the {width}x{height} canvas")]
    IndexOutOfBounds { index: usize, width: u32, height: u32 },
}

/// Error type for document load/save and export operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("GIF encode error: {0}")]
    Gif(#[from] gif::EncodingError),
    #[error("APNG encode error: {0}")]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Trace(#[from] TraceError),
}

impl From<Box<bincode::ErrorKind>> for DocumentError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        DocumentError::Serialize(e.to_string())
    }
}
