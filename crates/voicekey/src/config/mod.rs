mod behaviour_config;
#[allow(clippy::module_inception)]
mod config;
mod control_config;
mod transcription_config;

pub(crate) use {
    behaviour_config::BehaviourConfig, config::Config, control_config::ControlConfig,
    transcription_config::TranscriptionConfig,
};

pub(crate) const DEFAULT_AUTO_SUBMIT: bool = false;
pub(crate) const DEFAULT_PREVIEW_DURATION_MS: u64 = 4000;
pub(crate) const DEFAULT_MODEL: &str = "whisper-1";
pub(crate) const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";
pub(crate) const DEFAULT_BASE_NAME: &str = "voicekey";

pub(crate) fn default_auto_submit() -> bool {
    DEFAULT_AUTO_SUBMIT
}

pub(crate) fn default_preview_duration_ms() -> u64 {
    DEFAULT_PREVIEW_DURATION_MS
}

pub(crate) fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

pub(crate) fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

pub(crate) fn default_base_name() -> String {
    DEFAULT_BASE_NAME.to_string()
}

pub(crate) fn default_enabled() -> bool {
    true
}
