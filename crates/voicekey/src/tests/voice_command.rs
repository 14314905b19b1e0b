use crate::{VoiceCommand, config::BehaviourConfig, voice_command::parse};

fn all_enabled() -> BehaviourConfig {
    BehaviourConfig {
        auto_submit: false,
        preview_duration_ms: 4000,
        enable_open_settings_voice_command: true,
        enable_exit_app_voice_command: true,
        enable_auto_send_voice_command: true,
        enable_submit_voice_command: true,
        enable_show_commands_voice_command: true,
    }
}

/// WHAT: Exit phrases are recognized through punctuation and case
/// WHY: Transcripts arrive with arbitrary capitalization and trailing marks
#[test]
fn given_exit_phrase_when_parsing_then_exit_command() {
    let behavior = all_enabled();

    assert_eq!(parse("Exit App!", &behavior), Some(VoiceCommand::Exit));
    assert_eq!(parse("close app.", &behavior), Some(VoiceCommand::Exit));
    assert_eq!(parse("quit app", &behavior), Some(VoiceCommand::Exit));
}

/// WHAT: Politeness wrappers still match
/// WHY: Users phrase commands conversationally
#[test]
fn given_polite_phrase_when_parsing_then_command_recognized() {
    let behavior = all_enabled();

    assert_eq!(
        parse("please open settings", &behavior),
        Some(VoiceCommand::OpenSettings)
    );
    assert_eq!(
        parse("can you show settings", &behavior),
        Some(VoiceCommand::OpenSettings)
    );
    assert_eq!(
        parse("exit app please", &behavior),
        Some(VoiceCommand::Exit)
    );
}

/// WHAT: A disabled command never matches its own phrase
/// WHY: The enable flag is checked before phrase matching
#[test]
fn given_disabled_family_when_parsing_then_no_match() {
    // Given: Exit commands disabled, everything else enabled
    let mut behavior = all_enabled();
    behavior.enable_exit_app_voice_command = false;

    // When/Then: The exact exit phrase is not recognized
    assert_eq!(parse("exit app", &behavior), None);

    // And other families still work
    assert_eq!(
        parse("open settings", &behavior),
        Some(VoiceCommand::OpenSettings)
    );
}

/// WHAT: Auto-send phrases parse into on/off commands
/// WHY: Both the fixed table and free-form phrasings must land
#[test]
fn given_auto_send_phrases_when_parsing_then_toggle_commands() {
    let behavior = all_enabled();

    assert_eq!(
        parse("auto send on", &behavior),
        Some(VoiceCommand::AutoSendOn)
    );
    assert_eq!(
        parse("turn auto send to on", &behavior),
        Some(VoiceCommand::AutoSendOn)
    );
    assert_eq!(
        parse("set autosend to enabled", &behavior),
        Some(VoiceCommand::AutoSendOn)
    );
    assert_eq!(
        parse("auto send off", &behavior),
        Some(VoiceCommand::AutoSendOff)
    );
    assert_eq!(
        parse("please turn auto send to off", &behavior),
        Some(VoiceCommand::AutoSendOff)
    );
    assert_eq!(
        parse("disable auto send", &behavior),
        Some(VoiceCommand::AutoSendOff)
    );
}

/// WHAT: Submit and show-commands phrases are recognized
/// WHY: Both families ride the same normalized phrase tables
#[test]
fn given_submit_and_listing_phrases_when_parsing_then_recognized() {
    let behavior = all_enabled();

    assert_eq!(parse("send", &behavior), Some(VoiceCommand::Submit));
    assert_eq!(parse("press enter", &behavior), Some(VoiceCommand::Submit));
    assert_eq!(
        parse("show voice commands", &behavior),
        Some(VoiceCommand::ShowCommands)
    );
}

/// WHAT: Ordinary dictation text is not a command
/// WHY: False positives would eat the user's words
#[test]
fn given_ordinary_text_when_parsing_then_none() {
    let behavior = all_enabled();

    assert_eq!(parse("send me the report by friday", &behavior), None);
    assert_eq!(parse("the app should exit cleanly", &behavior), None);
    assert_eq!(parse("", &behavior), None);
    assert_eq!(parse("   ...   ", &behavior), None);
}
