//! Operator command surface
//!
//! Maps text commands such as `/paradd sales sip:bob@example.com` onto
//! [`ParallelCallHandle`] calls. The words of a line are parsed by clap in
//! multicall mode, so the first word selects the command. Only argument shape
//! is checked here; every business rule lives in the coordinator.

use std::fmt;
use std::str::FromStr;

use clap::Parser;

use crate::error::{ParCallError, ParCallResult};
use crate::service::ParallelCallHandle;
use crate::types::MediaDirection;

const MKPAR_USAGE: &str = "usage: /mkpar <name>";
const RMPAR_USAGE: &str = "usage: /rmpar <name>";
const PARADD_USAGE: &str = "usage: /paradd <name> <URI>\n       /paradd <name> <display name> <sip:uri>";
const PARCALL_USAGE: &str = "usage: /parcall <name>\n\
/parcall <name> audio=<inactive, sendonly, recvonly, sendrecv> video=<inactive, sendonly, recvonly, sendrecv>\n\
/parcall <name> <sendonly, recvonly, sendrecv>\n\
Audio & video must not be inactive at the same time";
const PARHANGUP_USAGE: &str = "usage: /parhangup <name>";

/// Short help for every command
pub const HELP: &str = "\
mkpar <name>                    Create parallel call group
rmpar <name>                    Remove parallel call group
clrpar                          Clear parallel call groups
paradd <name> <URI>             Add a call target to a group
parcall <name> [directions]     Initiate parallel call to given group
parhangup <name>                Hangup parallel call group
pardebug                        Print parallel call data";

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParCommand {
    CreateGroup {
        name: String,
    },
    RemoveGroup {
        name: String,
    },
    ClearGroups,
    AddPeer {
        group: String,
        address: String,
        display_name: Option<String>,
    },
    /// Directions left out fall back to the configured defaults
    ParallelCall {
        group: String,
        audio: Option<MediaDirection>,
        video: Option<MediaDirection>,
    },
    HangupGroup {
        name: String,
    },
    Debug,
}

/// Command words as typed by the operator, one subcommand per command
#[derive(Parser, Debug)]
#[command(multicall = true, disable_help_subcommand = true)]
enum CommandLine {
    /// Create parallel call group
    Mkpar { name: String },
    /// Remove parallel call group
    Rmpar { name: String },
    /// Clear parallel call groups
    Clrpar,
    /// Add a call target to a group
    Paradd {
        name: String,
        /// `<URI>` or `<display name> <sip:uri>`
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        target: Vec<String>,
    },
    /// Initiate parallel call to given group
    Parcall {
        name: String,
        directions: Vec<String>,
    },
    /// Hangup parallel call group
    Parhangup { name: String },
    /// Print parallel call data
    Pardebug,
}

impl ParCommand {
    /// Parse one command line. A leading `/` is optional.
    pub fn parse(line: &str) -> ParCallResult<Self> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some(&word) = words.first() else {
            return Err(ParCallError::usage(HELP));
        };

        // Any clap error maps to the usage text of the command word
        let parsed = CommandLine::try_parse_from(words.iter().copied()).map_err(|_| {
            match usage_for(word) {
                Some(usage) => ParCallError::usage(usage),
                None => ParCallError::usage(format!("unknown command: {}\n{}", word, HELP)),
            }
        })?;

        match parsed {
            CommandLine::Mkpar { name } => Ok(ParCommand::CreateGroup { name }),
            CommandLine::Rmpar { name } => Ok(ParCommand::RemoveGroup { name }),
            CommandLine::Clrpar => Ok(ParCommand::ClearGroups),
            CommandLine::Paradd { name, target } => parse_paradd(name, &target.join(" ")),
            CommandLine::Parcall { name, directions } => parse_parcall(name, &directions),
            CommandLine::Parhangup { name } => Ok(ParCommand::HangupGroup { name }),
            CommandLine::Pardebug => Ok(ParCommand::Debug),
        }
    }

    /// Command word used as message prefix
    pub fn name(&self) -> &'static str {
        match self {
            ParCommand::CreateGroup { .. } => "mkpar",
            ParCommand::RemoveGroup { .. } => "rmpar",
            ParCommand::ClearGroups => "clrpar",
            ParCommand::AddPeer { .. } => "paradd",
            ParCommand::ParallelCall { .. } => "parcall",
            ParCommand::HangupGroup { .. } => "parhangup",
            ParCommand::Debug => "pardebug",
        }
    }
}

impl FromStr for ParCommand {
    type Err = ParCallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Usage text shown when the arguments of `word` do not parse
fn usage_for(word: &str) -> Option<&'static str> {
    match word {
        "mkpar" => Some(MKPAR_USAGE),
        "rmpar" => Some(RMPAR_USAGE),
        "clrpar" | "pardebug" => Some(HELP),
        "paradd" => Some(PARADD_USAGE),
        "parcall" => Some(PARCALL_USAGE),
        "parhangup" => Some(PARHANGUP_USAGE),
        _ => None,
    }
}

/// `<URI>` or `<display name> <sip:uri>`
fn parse_paradd(group: String, target: &str) -> ParCallResult<ParCommand> {
    if let Some(open) = target.find('<') {
        let Some(inner) = target[open + 1..].strip_suffix('>') else {
            return Err(ParCallError::usage(PARADD_USAGE));
        };
        let address = inner.trim();
        if address.is_empty() || address.contains(['<', '>']) {
            return Err(ParCallError::usage(PARADD_USAGE));
        }
        let display_name = target[..open].trim();
        return Ok(ParCommand::AddPeer {
            group,
            address: address.to_string(),
            display_name: (!display_name.is_empty()).then(|| display_name.to_string()),
        });
    }

    if target.contains(char::is_whitespace) {
        return Err(ParCallError::usage(PARADD_USAGE));
    }
    Ok(ParCommand::AddPeer {
        group,
        address: target.to_string(),
        display_name: None,
    })
}

/// Nothing, one `<dir>` for both media, or `[audio=<dir>] [video=<dir>]`
fn parse_parcall(group: String, words: &[String]) -> ParCallResult<ParCommand> {
    let usage = || ParCallError::usage(PARCALL_USAGE);
    let direction = |word: &str| word.parse::<MediaDirection>().map_err(|_| usage());

    let (audio, video) = match words {
        [] => (None, None),
        [word] if !word.contains('=') => {
            let both = direction(word)?;
            (Some(both), Some(both))
        }
        pairs => {
            let mut audio = None;
            let mut video = None;
            for pair in pairs {
                let (key, value) = pair.split_once('=').ok_or_else(usage)?;
                let slot = match key {
                    "audio" => &mut audio,
                    "video" => &mut video,
                    _ => return Err(usage()),
                };
                if slot.replace(direction(value)?).is_some() {
                    return Err(usage());
                }
            }
            (audio, video)
        }
    };

    Ok(ParCommand::ParallelCall { group, audio, video })
}

/// Result of one operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

impl CommandOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    fn from_error(command: &str, error: ParCallError) -> Self {
        match error {
            ParCallError::InvalidCommand { usage } => Self::failed(usage),
            ParCallError::InvalidDirection => Self::failed(PARCALL_USAGE),
            other => Self::failed(format!("{}: {}", command, other)),
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Parse and execute one command line
pub async fn run_line(handle: &ParallelCallHandle, line: &str) -> CommandOutcome {
    match ParCommand::parse(line) {
        Ok(command) => execute(handle, command).await,
        Err(e) => CommandOutcome::from_error("parcall", e),
    }
}

/// Execute a parsed command against a running coordinator
pub async fn execute(handle: &ParallelCallHandle, command: ParCommand) -> CommandOutcome {
    let name = command.name();
    let result = match command {
        ParCommand::CreateGroup { name: group } => handle
            .create_group(&group)
            .await
            .map(|_| format!("mkpar: created call group {}", group)),
        ParCommand::RemoveGroup { name: group } => handle
            .remove_group(&group)
            .await
            .map(|_| format!("rmpar: removed call group {}", group)),
        ParCommand::ClearGroups => handle
            .clear_groups()
            .await
            .map(|_| "parcall: cleared parallel call groups".to_string()),
        ParCommand::AddPeer {
            group,
            address,
            display_name,
        } => handle
            .add_peer(&group, &address, display_name.as_deref())
            .await
            .map(|target| format!("paradd: added {} to {}", target, group)),
        ParCommand::ParallelCall { group, audio, video } => {
            let defaults = handle.media_defaults();
            let audio = audio.unwrap_or(defaults.audio);
            let video = video.unwrap_or(defaults.video);
            handle
                .start_parallel_call(&group, audio, video)
                .await
                .map(|report| {
                    let mut lines: Vec<String> = report
                        .placed
                        .iter()
                        .map(|call| {
                            format!(
                                "parallel call uri: {} id: {} audio={} video={}",
                                call.target, call.call_id, report.audio, report.video
                            )
                        })
                        .collect();
                    lines.extend(report.failed.iter().map(|e| format!("parcall: {}", e)));
                    lines.push(format!(
                        "parcall: {} call(s) placed for {}, {} failed",
                        report.placed_count(),
                        group,
                        report.failed_count()
                    ));
                    lines.join("\n")
                })
        }
        ParCommand::HangupGroup { name: group } => handle
            .hangup_group(&group)
            .await
            .map(|count| format!("parhangup: hung up {} call(s) of {}", count, group)),
        ParCommand::Debug => handle.debug_dump().await.map(|dump| dump.to_string()),
    };

    match result {
        Ok(message) => CommandOutcome::ok(message),
        Err(e) => CommandOutcome::from_error(name, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_commands() {
        assert_eq!(
            ParCommand::parse("/mkpar sales").unwrap(),
            ParCommand::CreateGroup { name: "sales".into() }
        );
        assert_eq!(
            ParCommand::parse("rmpar sales").unwrap(),
            ParCommand::RemoveGroup { name: "sales".into() }
        );
        assert_eq!(ParCommand::parse("clrpar").unwrap(), ParCommand::ClearGroups);
        assert_eq!(ParCommand::parse("/pardebug").unwrap(), ParCommand::Debug);

        assert_eq!(
            ParCommand::parse("/mkpar").unwrap_err(),
            ParCallError::usage(MKPAR_USAGE)
        );
        assert_eq!(
            ParCommand::parse("parhangup a b").unwrap_err(),
            ParCallError::usage(PARHANGUP_USAGE)
        );
        assert_eq!(
            ParCommand::parse("mkpar -h").unwrap_err(),
            ParCallError::usage(MKPAR_USAGE)
        );
        assert_eq!(
            ParCommand::parse("pardebug now").unwrap_err(),
            ParCallError::usage(HELP)
        );
        assert_eq!(
            ParCommand::parse("/dial bob").unwrap_err(),
            ParCallError::usage(format!("unknown command: dial\n{}", HELP))
        );
        assert_eq!(ParCommand::parse("   ").unwrap_err(), ParCallError::usage(HELP));
    }

    #[test]
    fn test_parse_paradd_forms() {
        assert_eq!(
            ParCommand::parse("paradd G sip:a@x").unwrap(),
            ParCommand::AddPeer {
                group: "G".into(),
                address: "sip:a@x".into(),
                display_name: None,
            }
        );
        assert_eq!(
            ParCommand::parse("/paradd G Anna Lena <sip:a@x>").unwrap(),
            ParCommand::AddPeer {
                group: "G".into(),
                address: "sip:a@x".into(),
                display_name: Some("Anna Lena".into()),
            }
        );
        assert_eq!(
            ParCommand::parse("paradd G  Anna   -  Lena <sip:a@x>").unwrap(),
            ParCommand::AddPeer {
                group: "G".into(),
                address: "sip:a@x".into(),
                display_name: Some("Anna - Lena".into()),
            }
        );
        assert_eq!(
            ParCommand::parse("paradd G <sip:a@x>").unwrap(),
            ParCommand::AddPeer {
                group: "G".into(),
                address: "sip:a@x".into(),
                display_name: None,
            }
        );

        for bad in ["paradd", "paradd G", "paradd G a b", "paradd G Anna <sip:a@x"] {
            assert_eq!(
                ParCommand::parse(bad).unwrap_err(),
                ParCallError::usage(PARADD_USAGE),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_parse_parcall_directions() {
        let parse = |line| match ParCommand::parse(line).unwrap() {
            ParCommand::ParallelCall { audio, video, .. } => (audio, video),
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(parse("parcall G"), (None, None));
        assert_eq!(
            parse("parcall G sendonly"),
            (Some(MediaDirection::SendOnly), Some(MediaDirection::SendOnly))
        );
        assert_eq!(
            parse("parcall G audio=recvonly video=inactive"),
            (Some(MediaDirection::RecvOnly), Some(MediaDirection::Inactive))
        );
        assert_eq!(parse("parcall G video=sendrecv"), (None, Some(MediaDirection::SendRecv)));

        for bad in [
            "parcall",
            "parcall G loud",
            "parcall G audio=loud",
            "parcall G audio=sendonly audio=recvonly",
            "parcall G colour=red",
            "parcall G sendonly recvonly",
        ] {
            assert_eq!(
                ParCommand::parse(bad).unwrap_err(),
                ParCallError::usage(PARCALL_USAGE),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_error_messages_carry_command_prefix() {
        let outcome = CommandOutcome::from_error("rmpar", ParCallError::not_found("G"));
        assert!(!outcome.success);
        assert_eq!(outcome.message, "rmpar: call group G does not exist");

        let outcome = CommandOutcome::from_error(
            "paradd",
            ParCallError::duplicate_target("G", "sip:a@x"),
        );
        assert_eq!(outcome.message, "paradd: sip:a@x already a target of G");

        let outcome = CommandOutcome::from_error("parcall", ParCallError::InvalidDirection);
        assert_eq!(outcome.message, PARCALL_USAGE);
    }
}
