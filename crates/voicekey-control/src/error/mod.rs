use std::time::Duration;

use error_location::ErrorLocation;
use thiserror::Error;

/// Cross-process coordination errors with source location tracking.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Reading, writing, or removing the exclusivity lock file failed.
    #[error("Exclusivity token I/O failed: {reason} {location}")]
    TokenIo {
        /// Description of the failed lock-file operation.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The owner's signal channel could not be bound or spoken to.
    #[error("Signal channel error: {reason} {location}")]
    SignalChannel {
        /// Description of the channel failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The previous owner did not release the token within the wait window.
    #[error("Exclusivity token not released within {waited:?} {location}")]
    AcquisitionTimeout {
        /// How long acquisition was probed before giving up.
        waited: Duration,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// IO error from filesystem or socket operations.
    #[error("IO error: {source} {location}")]
    IoError {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl From<std::io::Error> for ControlError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        ControlError::IoError {
            source,
            location: ErrorLocation::from(std::panic::Location::caller()),
        }
    }
}

/// Result type alias using [`ControlError`].
pub type Result<T> = std::result::Result<T, ControlError>;
