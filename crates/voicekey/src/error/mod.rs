use std::{panic::Location, result::Result as StdResult};

use error_location::ErrorLocation;
use thiserror::Error;
use voicekey_control::ControlError;

/// Application-level errors for the voicekey binary.
///
/// All variants include `ErrorLocation` for call-site tracking.
#[derive(Error, Debug)]
pub enum AppError {
    /// A preview was begun with a non-positive message id.
    #[error("Preview message id must be positive, got {id} {location}")]
    InvalidMessageId {
        /// The rejected message id.
        id: i64,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// A preview was begun while another is still open.
    #[error("A transcript preview is already active {location}")]
    PreviewAlreadyActive {
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Microphone capture failed to start or stop.
    #[error("Capture error: {reason} {location}")]
    CaptureFailed {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// The transcription provider failed or was cancelled.
    #[error("Transcription failed: {reason} {location}")]
    TranscriptionFailed {
        /// Human-readable reason for failure.
        reason: String,
        /// True when the failure looks like a credentials problem.
        authentication: bool,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Clipboard write or paste simulation failed.
    #[error("Text injection failed: {reason} {location}")]
    InjectionFailed {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Failed to register global hotkey.
    #[error("Hotkey registration failed: {reason} {location}")]
    HotkeyRegistrationFailed {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Failed to send message through async channel.
    #[error("Channel send failed: {message} {location}")]
    ChannelSendFailed {
        /// Human-readable error message.
        message: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Configuration loading or saving error.
    #[error("Configuration error: {reason} {location}")]
    ConfigError {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Cross-process coordination error.
    #[error("Control error: {source} {location}")]
    Control {
        /// The underlying coordination error.
        #[source]
        source: ControlError,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// IO error from filesystem operations.
    #[error("IO error: {source} {location}")]
    IoError {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Location where this error was created.
        location: ErrorLocation,
    },
}

impl AppError {
    /// True when this error should invalidate the cached provider so the
    /// next attempt forces reconfiguration.
    pub(crate) fn is_authentication(&self) -> bool {
        matches!(
            self,
            AppError::TranscriptionFailed {
                authentication: true,
                ..
            }
        )
    }
}

// Manual From impls with location tracking.
// Cannot use #[from] because it does not support extra fields.
impl From<ControlError> for AppError {
    #[track_caller]
    fn from(source: ControlError) -> Self {
        AppError::Control {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for AppError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        AppError::IoError {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Convenience type alias for Results using `AppError`.
pub type Result<T> = StdResult<T, AppError>;
