//! Command-line argument parsing.
//!
//! A launch carries at most one explicit request; conflicting flags are a
//! startup error reported with the usage text and exit code 2.

use voicekey_control::LaunchRequest;

/// What the process was asked to do at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliCommand {
    /// Run the coordinated launch protocol with the parsed request.
    Launch(LaunchRequest),
    /// Offline diagnostic bypassing the coordination layer.
    SmokeTest,
}

/// Usage text printed to stderr on argument errors.
pub const USAGE: &str = "\
Usage: voicekey [FLAG]

  (no flag)           start, or trigger a dictation cycle in the running instance
  --listen            trigger a dictation cycle in the running instance, or start fresh
  --submit            trigger submit behavior in the running instance
  --close             request graceful shutdown of the running instance
  --replace-existing  close any running instance, then start this one
  --test              offline smoke test, no coordination

At most one flag may be given.";

/// Parse process arguments (without the program name).
pub fn parse_args<I>(args: I) -> Result<CliCommand, String>
where
    I: IntoIterator<Item = String>,
{
    let mut requests: Vec<CliCommand> = Vec::new();

    for arg in args {
        let command = match arg.as_str() {
            "--close" => CliCommand::Launch(LaunchRequest::Close),
            "--listen" => CliCommand::Launch(LaunchRequest::Listen),
            "--submit" => CliCommand::Launch(LaunchRequest::Submit),
            "--replace-existing" => CliCommand::Launch(LaunchRequest::ReplaceExisting),
            "--test" => CliCommand::SmokeTest,
            unknown => return Err(format!("Unknown argument: {unknown}")),
        };
        requests.push(command);
    }

    match requests.len() {
        0 => Ok(CliCommand::Launch(LaunchRequest::Default)),
        1 => Ok(requests.remove(0)),
        _ => Err("Conflicting flags: at most one request may be given".to_string()),
    }
}
