use crate::launch::{CliCommand, parse_args};

use voicekey_control::LaunchRequest;

fn parse(args: &[&str]) -> Result<CliCommand, String> {
    parse_args(args.iter().map(|s| s.to_string()))
}

/// WHAT: No flags parse as the default launch request
/// WHY: A bare start must become the owner or hand off a listen
#[test]
fn given_no_flags_when_parsing_then_default_request() {
    // Given/When: Parsing an empty argument list
    let command = parse(&[]);

    // Then: The default launch request comes back
    assert_eq!(command, Ok(CliCommand::Launch(LaunchRequest::Default)));
}

/// WHAT: Each explicit flag maps to its launch request
/// WHY: The CLI surface is the cross-process control entry point
#[test]
fn given_single_flag_when_parsing_then_matching_request() {
    assert_eq!(
        parse(&["--close"]),
        Ok(CliCommand::Launch(LaunchRequest::Close))
    );
    assert_eq!(
        parse(&["--listen"]),
        Ok(CliCommand::Launch(LaunchRequest::Listen))
    );
    assert_eq!(
        parse(&["--submit"]),
        Ok(CliCommand::Launch(LaunchRequest::Submit))
    );
    assert_eq!(
        parse(&["--replace-existing"]),
        Ok(CliCommand::Launch(LaunchRequest::ReplaceExisting))
    );
    assert_eq!(parse(&["--test"]), Ok(CliCommand::SmokeTest));
}

/// WHAT: Conflicting flags are a parse error
/// WHY: At most one explicit request may be present per launch
#[test]
fn given_conflicting_flags_when_parsing_then_error() {
    // Given/When: Parsing two explicit requests
    let command = parse(&["--close", "--listen"]);

    // Then: Parsing fails
    assert!(command.is_err());
}

/// WHAT: The smoke test flag conflicts with launch requests too
/// WHY: The smoke test bypasses coordination entirely
#[test]
fn given_test_flag_with_request_when_parsing_then_error() {
    assert!(parse(&["--test", "--listen"]).is_err());
}

/// WHAT: Unknown arguments are a parse error
/// WHY: Silent typos would strand the user with a default launch
#[test]
fn given_unknown_flag_when_parsing_then_error() {
    assert!(parse(&["--frobnicate"]).is_err());
}
