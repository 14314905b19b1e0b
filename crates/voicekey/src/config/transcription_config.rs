use crate::config::{default_endpoint, default_model};

use serde::{Deserialize, Serialize};

/// Remote transcription provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// API key for the transcription endpoint. Empty means unconfigured.
    #[serde(default)]
    pub api_key: String,
    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Transcription endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl TranscriptionConfig {
    /// True when an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
