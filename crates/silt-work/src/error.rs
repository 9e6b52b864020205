//! Error types for the work dispatch domain.

/// The result type used throughout silt-work.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in coordination and dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A subtask was recorded as failed by the worker that executed it.
    #[error("subtask failed: {reason}")]
    TaskFailed {
        /// The failure reason reported by the worker.
        reason: String,
    },

    /// A watch stream ended while results were still outstanding.
    #[error("coordination watch closed unexpectedly")]
    WatchClosed,

    /// An envelope could not be packed or unpacked.
    #[error("envelope error: {message}")]
    Envelope {
        /// Description of the failure.
        message: String,
    },

    /// An error from silt-core (storage, cancellation, internal).
    #[error(transparent)]
    Core(#[from] silt_core::Error),
}

impl Error {
    /// Creates an envelope error from any displayable cause.
    #[must_use]
    pub fn envelope(message: impl Into<String>) -> Self {
        Self::Envelope {
            message: message.into(),
        }
    }

    /// Returns true if the error is a cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Core(silt_core::Error::Canceled(_)))
    }
}
