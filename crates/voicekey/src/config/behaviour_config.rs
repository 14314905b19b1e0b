use crate::config::{default_auto_submit, default_enabled, default_preview_duration_ms};

use serde::{Deserialize, Serialize};

/// Application behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviourConfig {
    /// Press Enter after pasting a transcript that timed out unprompted.
    #[serde(default = "default_auto_submit")]
    pub auto_submit: bool,
    /// How long the transcript preview stays visible before the timeout
    /// decision is taken.
    #[serde(default = "default_preview_duration_ms")]
    pub preview_duration_ms: u64,
    /// Allow the "open settings" voice command.
    #[serde(default = "default_enabled")]
    pub enable_open_settings_voice_command: bool,
    /// Allow the "exit app" voice command.
    #[serde(default = "default_enabled")]
    pub enable_exit_app_voice_command: bool,
    /// Allow the "auto send on/off" voice commands.
    #[serde(default = "default_enabled")]
    pub enable_auto_send_voice_command: bool,
    /// Allow the "send"/"submit" voice command.
    #[serde(default = "default_enabled")]
    pub enable_submit_voice_command: bool,
    /// Allow the "show voice commands" voice command.
    #[serde(default = "default_enabled")]
    pub enable_show_commands_voice_command: bool,
}
