//! Remote transcription provider.
//!
//! Ships captured WAV audio to an OpenAI-compatible transcription endpoint
//! and returns the recognized text. Calls are synchronous and always run
//! under `spawn_blocking` (a blocking HTTP client must not run on the async
//! runtime); the session bounds them with its own timeout and a cooperative
//! cancellation channel observed at the call boundaries.

use crate::{AppError, AppResult, config::TranscriptionConfig};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use reqwest::blocking::{Client, multipart};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// Fixed timeout enforced on every transcription attempt, independent of
/// shutdown cancellation.
pub const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

/// A provider that turns captured audio into text.
pub trait TranscriptionProvider: Send + Sync {
    /// Transcribe WAV audio, observing `cancel` at call boundaries.
    fn transcribe(&self, wav_bytes: &[u8], cancel: &watch::Receiver<bool>) -> AppResult<String>;
}

/// HTTP transcription client against an OpenAI-compatible endpoint.
pub struct RemoteTranscriber {
    endpoint: String,
    api_key: String,
    model: String,
}

impl RemoteTranscriber {
    /// Build a provider from the transcription configuration.
    ///
    /// Returns `None` when no API key is configured; the session reports
    /// that instead of attempting doomed requests.
    #[instrument(skip(config))]
    pub fn from_config(config: &TranscriptionConfig) -> Option<Self> {
        if !config.has_api_key() {
            return None;
        }

        info!(model = %config.model, "Transcription provider configured");

        Some(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
        })
    }
}

impl TranscriptionProvider for RemoteTranscriber {
    #[instrument(skip(self, wav_bytes, cancel))]
    fn transcribe(&self, wav_bytes: &[u8], cancel: &watch::Receiver<bool>) -> AppResult<String> {
        if *cancel.borrow() {
            return Err(cancelled());
        }

        // Built per call: the blocking client owns a worker thread and must
        // be created outside the async runtime, which is exactly where this
        // method runs. One build per utterance is noise next to the upload.
        let client = Client::builder()
            .timeout(TRANSCRIBE_TIMEOUT)
            .build()
            .map_err(|e| AppError::TranscriptionFailed {
                reason: format!("Failed to build HTTP client: {}", e),
                authentication: false,
                location: ErrorLocation::from(Location::caller()),
            })?;

        let part = multipart::Part::bytes(wav_bytes.to_vec())
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| AppError::TranscriptionFailed {
                reason: format!("Failed to build audio part: {}", e),
                authentication: false,
                location: ErrorLocation::from(Location::caller()),
            })?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", "en")
            .text("response_format", "text");

        let response = client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| AppError::TranscriptionFailed {
                reason: format!("Request failed: {}", e),
                authentication: false,
                location: ErrorLocation::from(Location::caller()),
            })?;

        if *cancel.borrow() {
            return Err(cancelled());
        }

        let status = response.status();
        if !status.is_success() {
            let authentication = status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN;
            let body = response.text().unwrap_or_default();
            return Err(AppError::TranscriptionFailed {
                reason: format!("Endpoint returned {}: {}", status, body.trim()),
                authentication,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let text = response.text().map_err(|e| AppError::TranscriptionFailed {
            reason: format!("Failed to read response body: {}", e),
            authentication: false,
            location: ErrorLocation::from(Location::caller()),
        })?;

        let text = text.trim().to_string();
        debug!(text_len = text.len(), "Transcription response received");

        Ok(text)
    }
}

#[track_caller]
fn cancelled() -> AppError {
    AppError::TranscriptionFailed {
        reason: "Cancelled by shutdown".to_string(),
        authentication: false,
        location: ErrorLocation::from(Location::caller()),
    }
}
