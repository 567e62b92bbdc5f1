use crate::imaging::ImagingError;
use thiserror::Error;

/// Failure of an operation that touches stored assets.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] ImagingError),
    #[error("Source asset not found: {0}")]
    SourceNotFound(String),
}

impl AssetError {
    /// Read failures that mean "no such asset" rather than a broken store.
    pub(crate) fn from_read(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AssetError::SourceNotFound(path.to_string())
        } else {
            AssetError::Io(err)
        }
    }
}
