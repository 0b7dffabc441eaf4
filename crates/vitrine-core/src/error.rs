use std::io;

/// Failures surfaced by catalog mutations. The HTTP layer maps each variant
/// to a wire status; directory-cleanup failures never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("thumbnail: {0}")]
    Thumbnail(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CatalogError {
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    #[must_use]
    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    #[must_use]
    pub fn invalid_name(what: impl Into<String>) -> Self {
        Self::InvalidName(what.into())
    }
}
