//! Terminal commands.
//!
//! A command line reads `<supervisor> <command> [args...]`. Every command name
//! maps to a parser with a fixed signature producing a typed [`Command`];
//! missing trailing arguments are read as empty strings.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::config::Difficulty;
use crate::manager::SupervisorManager;
use crate::supervisor::SupervisorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Pause,
    Status,
    Stats,
    Copy { source: String, target: String },
    Tmp { source: String, difficulty: Option<Difficulty> },
    StopAll,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("no handler found for {message}@{supervisor}")]
    Unknown { message: String, supervisor: String },
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

type Parser = fn(&[&str]) -> Result<Command, CommandError>;

struct CommandSpec {
    usage: &'static str,
    parse: Parser,
}

/// Command name to typed handler
pub struct CommandTable {
    commands: BTreeMap<&'static str, CommandSpec>,
}

/// Argument `idx`, or an empty string when missing
fn arg<'a>(args: &[&'a str], idx: usize) -> &'a str {
    args.get(idx).copied().unwrap_or("")
}

fn parse_copy(args: &[&str]) -> Result<Command, CommandError> {
    let (source, target) = (arg(args, 0), arg(args, 1));
    if source.is_empty() || target.is_empty() {
        return Err(CommandError::Usage("<supervisor> copy <source> <target>"));
    }
    Ok(Command::Copy {
        source: source.to_string(),
        target: target.to_string(),
    })
}

fn parse_tmp(args: &[&str]) -> Result<Command, CommandError> {
    let source = arg(args, 0);
    if source.is_empty() {
        return Err(CommandError::InvalidArgument(
            "missing source supervisor name".into(),
        ));
    }
    let difficulty = match arg(args, 1) {
        "" => None,
        diff => Some(diff.parse().map_err(CommandError::InvalidArgument)?),
    };
    Ok(Command::Tmp {
        source: source.to_string(),
        difficulty,
    })
}

impl CommandTable {
    pub fn new() -> Self {
        let mut commands = BTreeMap::new();
        let mut add = |name: &'static str, usage: &'static str, parse: Parser| {
            commands.insert(name, CommandSpec { usage, parse });
        };
        add("start", "<supervisor> start", |_| Ok(Command::Start));
        add("stop", "<supervisor> stop", |_| Ok(Command::Stop));
        add("pause", "<supervisor> pause", |_| Ok(Command::Pause));
        add("status", "<supervisor> status", |_| Ok(Command::Status));
        add("stats", "<supervisor> stats", |_| Ok(Command::Stats));
        add("copy", "<supervisor> copy <source> <target>", parse_copy);
        add("tmp", "<supervisor> tmp <source> [difficulty]", parse_tmp);
        add("stop-all", "$ stop-all", |_| Ok(Command::StopAll));
        Self { commands }
    }

    /// Split a line into its supervisor and typed command
    pub fn parse(&self, line: &str) -> Result<(String, Command), CommandError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let supervisor = *fields.first().ok_or(CommandError::Empty)?;
        let name = arg(&fields, 1);
        let args = fields.get(2..).unwrap_or(&[]);

        match self.commands.get(name) {
            Some(entry) => Ok((supervisor.to_string(), (entry.parse)(args)?)),
            None => Err(CommandError::Unknown {
                message: line.trim().to_string(),
                supervisor: supervisor.to_string(),
            }),
        }
    }

    /// One usage line per command
    pub fn help(&self) -> String {
        let mut help = String::new();
        for entry in self.commands.values() {
            let _ = writeln!(help, "  {}", entry.usage);
        }
        help
    }

    /// Parse and execute `line`, returning the reply for the terminal
    pub async fn dispatch(
        &self,
        manager: &SupervisorManager,
        line: &str,
    ) -> Result<String, CommandError> {
        let (supervisor, command) = self.parse(line)?;
        execute(manager, &supervisor, command).await
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

async fn execute(
    manager: &SupervisorManager,
    supervisor: &str,
    command: Command,
) -> Result<String, CommandError> {
    let reply = match command {
        Command::Start => {
            manager.start(supervisor).await?;
            format!("{} started", supervisor)
        }
        Command::Stop => {
            manager.stop(supervisor).await?;
            format!("{} stopped", supervisor)
        }
        Command::Pause => {
            let status = manager.toggle_pause(supervisor)?;
            format!("{} is {}", supervisor, status)
        }
        Command::Status => format!("{}: {}", supervisor, manager.status(supervisor)?),
        Command::Stats => {
            let stats = manager.stats(supervisor)?;
            let mut reply = format!(
                "{}: games={} runs={} failed={} errors={} drops={}",
                supervisor,
                stats.games,
                stats.runs_completed,
                stats.runs_failed,
                stats.errors,
                stats.drops.len()
            );
            if let Some(last) = &stats.last_error {
                let _ = write!(reply, " last_error=\"{}\"", last);
            }
            for item in &stats.drops {
                let _ = write!(reply, "\n  {} {} ({})", item.at.format("%H:%M:%S"), item.name, item.quality);
            }
            reply
        }
        Command::Copy { source, target } => {
            let name = manager.copy_character(&source, &target, &Default::default())?;
            format!("Created new config: {}", name)
        }
        Command::Tmp { source, difficulty } => {
            let name = manager.tmp_copy(&source, difficulty)?;
            format!("Created tmp config: {}", name)
        }
        Command::StopAll => {
            manager.stop_all().await;
            "All supervisors stopped".to_string()
        }
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_commands() {
        let table = CommandTable::new();
        assert_eq!(table.parse("sorc start").unwrap(), ("sorc".to_string(), Command::Start));
        assert_eq!(
            table.parse("$ copy sorc pala").unwrap().1,
            Command::Copy {
                source: "sorc".into(),
                target: "pala".into()
            }
        );
        assert_eq!(
            table.parse("$ tmp sorc hell").unwrap().1,
            Command::Tmp {
                source: "sorc".into(),
                difficulty: Some(Difficulty::Hell)
            }
        );
        assert_eq!(
            table.parse("$ tmp sorc").unwrap().1,
            Command::Tmp {
                source: "sorc".into(),
                difficulty: None
            }
        );
    }

    #[test]
    fn test_unknown_command_reply() {
        let table = CommandTable::new();
        let err = table.parse("sorc dance now").unwrap_err();
        assert_eq!(err.to_string(), "no handler found for sorc dance now@sorc");

        let err = table.parse("sorc").unwrap_err();
        assert_eq!(err.to_string(), "no handler found for sorc@sorc");
    }

    #[test]
    fn test_bad_arguments() {
        let table = CommandTable::new();
        assert!(matches!(table.parse("   "), Err(CommandError::Empty)));
        assert!(matches!(table.parse("$ copy sorc"), Err(CommandError::Usage(_))));
        assert!(matches!(table.parse("$ tmp"), Err(CommandError::InvalidArgument(_))));
        assert!(matches!(
            table.parse("$ tmp sorc impossible"),
            Err(CommandError::InvalidArgument(_))
        ));
    }
}
