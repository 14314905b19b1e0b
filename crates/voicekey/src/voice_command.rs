//! Voice command phrase recognition.
//!
//! Transcribed utterances are normalized (lowercased, punctuation stripped,
//! whitespace collapsed) and matched against fixed phrase tables with
//! politeness wrappers. Each command family is gated on its configuration
//! flag *before* phrase matching: a disabled command never matches even
//! when the phrase is recognized.

use crate::config::BehaviourConfig;

/// A recognized voice command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    /// Shut the application down.
    Exit,
    /// Open the settings (the configuration file).
    OpenSettings,
    /// Turn auto-send on.
    AutoSendOn,
    /// Turn auto-send off.
    AutoSendOff,
    /// Press Enter in the focused window.
    Submit,
    /// List the enabled voice commands.
    ShowCommands,
}

impl VoiceCommand {
    /// Human-readable name shown in notices.
    pub fn display_name(&self) -> &'static str {
        match self {
            VoiceCommand::Exit => "Exit App",
            VoiceCommand::OpenSettings => "Open Settings",
            VoiceCommand::AutoSendOn => "Auto-Send: On",
            VoiceCommand::AutoSendOff => "Auto-Send: Off",
            VoiceCommand::Submit => "Send (Press Enter)",
            VoiceCommand::ShowCommands => "Show Voice Commands",
        }
    }
}

const EXIT_PHRASES: &[&str] = &[
    "exit app",
    "close app",
    "quit app",
    "close voice key",
    "exit voice key",
    "close voicekey",
    "exit voicekey",
];

const OPEN_SETTINGS_PHRASES: &[&str] = &[
    "open settings",
    "open settings screen",
    "show settings",
    "show settings screen",
];

const SUBMIT_PHRASES: &[&str] = &["send", "send message", "send command", "submit", "press enter"];

const SHOW_COMMANDS_PHRASES: &[&str] = &[
    "show voice commands",
    "show voice command",
    "list voice commands",
    "what are voice commands",
];

const AUTO_SEND_ON_PHRASES: &[&str] = &[
    "auto send yes",
    "autosend yes",
    "set auto send yes",
    "set autosend yes",
    "auto send on",
    "auto on",
    "autosend on",
    "set auto send on",
    "set autosend on",
    "enable auto send",
    "turn on auto send",
];

const AUTO_SEND_OFF_PHRASES: &[&str] = &[
    "auto send no",
    "autosend no",
    "set auto send no",
    "set autosend no",
    "auto send off",
    "auto off",
    "autosend off",
    "set auto send off",
    "set autosend off",
    "disable auto send",
    "turn off auto send",
];

const AUTO_SEND_ON_TERMINALS: &[&str] = &["yes", "on", "true", "enable", "enabled"];
const AUTO_SEND_OFF_TERMINALS: &[&str] = &["no", "off", "of", "false", "disable", "disabled"];

/// Match a transcribed utterance against the enabled command families.
pub fn parse(text: &str, behavior: &BehaviourConfig) -> Option<VoiceCommand> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }

    if behavior.enable_exit_app_voice_command && matches_phrase(&normalized, EXIT_PHRASES) {
        return Some(VoiceCommand::Exit);
    }

    if behavior.enable_open_settings_voice_command
        && matches_phrase(&normalized, OPEN_SETTINGS_PHRASES)
    {
        return Some(VoiceCommand::OpenSettings);
    }

    if behavior.enable_auto_send_voice_command
        && (matches_phrase(&normalized, AUTO_SEND_ON_PHRASES)
            || matches_auto_send(&normalized, AUTO_SEND_ON_TERMINALS))
    {
        return Some(VoiceCommand::AutoSendOn);
    }

    if behavior.enable_auto_send_voice_command
        && (matches_phrase(&normalized, AUTO_SEND_OFF_PHRASES)
            || matches_auto_send(&normalized, AUTO_SEND_OFF_TERMINALS))
    {
        return Some(VoiceCommand::AutoSendOff);
    }

    if behavior.enable_submit_voice_command && matches_phrase(&normalized, SUBMIT_PHRASES) {
        return Some(VoiceCommand::Submit);
    }

    if behavior.enable_show_commands_voice_command
        && matches_phrase(&normalized, SHOW_COMMANDS_PHRASES)
    {
        return Some(VoiceCommand::ShowCommands);
    }

    None
}

/// Lowercase, replace every non-alphanumeric run with one space, and trim.
fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !normalized.is_empty() {
                normalized.push(' ');
            }
            pending_space = false;
            normalized.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    normalized
}

fn matches_phrase(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| {
        normalized == *phrase
            || normalized == format!("please {phrase}")
            || normalized == format!("can you {phrase}")
            || normalized == format!("could you {phrase}")
            || normalized == format!("{phrase} please")
    })
}

/// Free-form auto-send matcher: optional politeness, optional "set"/"turn",
/// "auto"/"autosend" with optional "send", optional "to", then a terminal
/// word, with an optional trailing "please".
fn matches_auto_send(normalized: &str, terminals: &[&str]) -> bool {
    let mut tokens: Vec<&str> = normalized.split(' ').collect();

    if tokens.last() == Some(&"please") {
        tokens.pop();
    }

    let mut i = 0;
    if tokens.first() == Some(&"please") {
        i += 1;
    } else if tokens.len() >= 2 && (tokens[0] == "can" || tokens[0] == "could") && tokens[1] == "you"
    {
        i += 2;
    }

    if tokens.get(i) == Some(&"set") || tokens.get(i) == Some(&"turn") {
        i += 1;
    }

    match tokens.get(i) {
        Some(&"autosend") => i += 1,
        Some(&"auto") => {
            i += 1;
            if tokens.get(i) == Some(&"send") {
                i += 1;
            }
        }
        _ => return false,
    }

    if tokens.get(i) == Some(&"to") {
        i += 1;
    }

    match tokens.get(i) {
        Some(terminal) if terminals.contains(terminal) => i + 1 == tokens.len(),
        _ => false,
    }
}
