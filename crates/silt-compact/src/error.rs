//! Error type for the compaction domain.

/// The result type used throughout silt-compact.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during distributed compaction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the file set layer.
    #[error(transparent)]
    Fileset(#[from] silt_fileset::Error),

    /// An error from the dispatch layer.
    #[error(transparent)]
    Work(#[from] silt_work::Error),

    /// An error from silt-core.
    #[error(transparent)]
    Core(#[from] silt_core::Error),
}

impl Error {
    /// Returns true if the error is a cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        match self {
            Self::Fileset(err) => err.is_canceled(),
            Self::Work(err) => err.is_canceled(),
            Self::Core(err) => matches!(err, silt_core::Error::Canceled(_)),
        }
    }
}
