//! Error types for the file set domain.

/// The result type used throughout silt-fileset.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in file set operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file's data operations are missing the leading header op.
    #[error("file '{path}' has no header data op")]
    MissingHeader {
        /// The path whose header is missing.
        path: String,
    },

    /// A file's data operations are ordered inconsistently.
    #[error("file '{path}' has inconsistent data op ordering: {message}")]
    OpOrdering {
        /// The offending path.
        path: String,
        /// Description of the inconsistency.
        message: String,
    },

    /// A writer received paths out of order.
    #[error("path '{path}' is not greater than previously written '{previous}'")]
    PathOrder {
        /// The path that broke the ordering.
        path: String,
        /// The last path accepted by the writer.
        previous: String,
    },

    /// A tar name failed canonical path validation.
    #[error("tar path '{path}' is not canonical")]
    UncleanTarPath {
        /// The rejected name.
        path: String,
    },

    /// A tar encoding or decoding operation failed.
    #[error("tar encoding error: {message}")]
    TarEncoding {
        /// Description of the failure.
        message: String,
    },

    /// An error from silt-core (storage, content, cancellation).
    #[error(transparent)]
    Core(#[from] silt_core::Error),
}

impl Error {
    /// Creates a tar encoding error from any displayable cause.
    #[must_use]
    pub fn tar(message: impl Into<String>) -> Self {
        Self::TarEncoding {
            message: message.into(),
        }
    }

    /// Returns true if the error is a cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Core(silt_core::Error::Canceled(_)))
    }
}
