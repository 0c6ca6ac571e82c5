//! Building commands from flat argument lists.
//!
//! Grammar, one command per `;`-separated group:
//!
//! ```text
//! changeAlgo  <pipeline> <element> <algorithm> (<param> <value>)*
//! changeParam <pipeline> <element> <param> <value>
//! shedding    <pipeline> <element> <shedder|-|none> (<key> <value>)*
//! replay      <pipeline> <sink> <ticket> <start:bool> (<from> <to> <speed> <query>...)?
//! pipeline    <pipeline> <start|connect|disconnect|stop>
//! ```
//!
//! More than one group yields a [`Command::Sequence`].

use super::element::{AlgorithmChangeCommand, LoadSheddingCommand, ParameterChangeCommand};
use super::parameters::{ParameterName, ParameterType, ParameterValue};
use super::replay::{PipelineCommand, PipelineStatus, ReplayCommand, ReplayWindow};
use super::{Command, CommandError, CommandSequence};
use chrono::{DateTime, Utc};

const SEPARATOR: &str = ";";

/// Parse one or more commands from `args`.
pub fn parse_command(args: &[&str]) -> Result<Command, CommandError> {
    let groups: Vec<&[&str]> = args
        .split(|arg| *arg == SEPARATOR)
        .filter(|group| !group.is_empty())
        .collect();

    match groups.as_slice() {
        [] => Err(CommandError::Parse("no command given".into())),
        [single] => parse_single(single),
        many => {
            let commands = many
                .iter()
                .map(|group| parse_single(group))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::Sequence(CommandSequence::new(commands)))
        }
    }
}

fn parse_single(args: &[&str]) -> Result<Command, CommandError> {
    let (name, rest) = args
        .split_first()
        .ok_or_else(|| CommandError::Parse("no command given".into()))?;

    match name.to_ascii_lowercase().as_str() {
        "changealgo" => parse_algorithm_change(rest),
        "changeparam" => parse_parameter_change(rest),
        "shedding" => parse_load_shedding(rest),
        "replay" => parse_replay(rest),
        "pipeline" => parse_pipeline(rest),
        _ => Err(CommandError::UnknownCommand(name.to_string())),
    }
}

/// Check the positional argument count, `at_least` when trailing arguments
/// are allowed.
fn expect_args(
    command: &str,
    args: &[&str],
    count: usize,
    at_least: bool,
) -> Result<(), CommandError> {
    let ok = if at_least {
        args.len() >= count
    } else {
        args.len() == count
    };
    if ok {
        Ok(())
    } else {
        Err(CommandError::Parse(format!(
            "{} expects {}{} arguments, got {}",
            command,
            if at_least { "at least " } else { "" },
            count,
            args.len()
        )))
    }
}

/// Trailing `<key> <value>` pairs.
fn pairs<'a>(command: &str, args: &'a [&'a str]) -> Result<Vec<(&'a str, &'a str)>, CommandError> {
    if args.len() % 2 != 0 {
        return Err(CommandError::Parse(format!(
            "{}: parameter '{}' has no value",
            command,
            args[args.len() - 1]
        )));
    }
    Ok(args.chunks(2).map(|pair| (pair[0], pair[1])).collect())
}

fn parse_algorithm_change(args: &[&str]) -> Result<Command, CommandError> {
    expect_args("changeAlgo", args, 3, true)?;
    let mut command = AlgorithmChangeCommand::new(args[0], args[1], args[2]);

    for (key, value) in pairs("changeAlgo", &args[3..])? {
        let name = ParameterName::from_token(key).ok_or_else(|| {
            CommandError::InvalidArgument(format!("unknown algorithm parameter '{}'", key))
        })?;
        // Integers go in typed, anything else is kept as text
        match (name.value_type(), value.parse::<i64>()) {
            (ParameterType::Int, Ok(v)) => command.set_int_parameter(name, v)?,
            _ => command.set_string_parameter(name, value),
        }
    }
    Ok(command.into())
}

fn parse_parameter_change(args: &[&str]) -> Result<Command, CommandError> {
    expect_args("changeParam", args, 4, false)?;
    let value = ParameterValue::parse(args[3]);
    Ok(ParameterChangeCommand::new(args[0], args[1], args[2], value).into())
}

fn parse_load_shedding(args: &[&str]) -> Result<Command, CommandError> {
    expect_args("shedding", args, 3, true)?;
    let shedder = match args[2] {
        "-" => None,
        s if s.eq_ignore_ascii_case("none") => None,
        s => Some(s.to_string()),
    };
    let mut command = LoadSheddingCommand::new(args[0], args[1], shedder);
    let parameters = pairs("shedding", &args[3..])?;
    if command.is_disable() && !parameters.is_empty() {
        return Err(CommandError::InvalidArgument(
            "disabling load shedding takes no parameters".into(),
        ));
    }
    for (key, value) in parameters {
        command.set_parameter(key, ParameterValue::parse(value));
    }
    Ok(command.into())
}

fn parse_timestamp(token: &str) -> Result<DateTime<Utc>, CommandError> {
    DateTime::parse_from_rfc3339(token)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CommandError::InvalidArgument(format!("bad timestamp '{}': {}", token, e)))
}

fn parse_replay(args: &[&str]) -> Result<Command, CommandError> {
    expect_args("replay", args, 4, true)?;
    let ticket: u64 = args[2]
        .parse()
        .map_err(|_| CommandError::InvalidArgument(format!("bad ticket '{}'", args[2])))?;
    let start: bool = args[3]
        .parse()
        .map_err(|_| CommandError::InvalidArgument(format!("bad start flag '{}'", args[3])))?;

    let window = match &args[4..] {
        [] => None,
        [from, to, speed, query @ ..] => {
            let speed: f64 = speed
                .parse()
                .map_err(|_| CommandError::InvalidArgument(format!("bad speed '{}'", speed)))?;
            Some(ReplayWindow {
                from: parse_timestamp(from)?,
                to: parse_timestamp(to)?,
                speed,
                query: query.join(" "),
            })
        }
        partial => {
            return Err(CommandError::Parse(format!(
                "replay window needs <from> <to> <speed> [query], got {} arguments",
                partial.len()
            )))
        }
    };

    if start {
        Ok(ReplayCommand::start(args[0], args[1], ticket, window)?.into())
    } else if window.is_some() {
        Err(CommandError::InvalidArgument(
            "stopping a replay takes no window".into(),
        ))
    } else {
        Ok(ReplayCommand::stop(args[0], args[1], ticket).into())
    }
}

fn parse_pipeline(args: &[&str]) -> Result<Command, CommandError> {
    expect_args("pipeline", args, 2, false)?;
    let status = PipelineStatus::from_token(args[1]).ok_or_else(|| {
        CommandError::InvalidArgument(format!("unknown pipeline status '{}'", args[1]))
    })?;
    Ok(PipelineCommand::new(args[0], status).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_algorithm_with_parameters() {
        let command = parse_command(&[
            "changeAlgo", "pip", "switch", "fast", "inputPort", "4000", "targetHost", "node-2",
        ])
        .unwrap();

        let Command::AlgorithmChange(c) = command else {
            panic!("expected an algorithm change");
        };
        assert_eq!(c.target.to_string(), "pip/switch");
        assert_eq!(c.algorithm, "fast");
        assert_eq!(c.parameters.get(ParameterName::InputPort), Some(&ParameterValue::Int(4000)));
        assert_eq!(
            c.get_string_parameter(ParameterName::TargetHost, None).as_deref(),
            Some("node-2")
        );
    }

    #[test]
    fn test_non_numeric_int_parameter_falls_back_to_text() {
        let command = parse_command(&["changeAlgo", "p", "e", "a", "warmupDelay", "soon"]).unwrap();
        let Command::AlgorithmChange(c) = command else {
            panic!("expected an algorithm change");
        };
        assert_eq!(
            c.parameters.get(ParameterName::WarmupDelay),
            Some(&ParameterValue::Text("soon".into()))
        );
    }

    #[test]
    fn test_unknown_parameter_and_dangling_value() {
        assert!(matches!(
            parse_command(&["changeAlgo", "p", "e", "a", "colour", "red"]),
            Err(CommandError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_command(&["changeAlgo", "p", "e", "a", "inputPort"]),
            Err(CommandError::Parse(_))
        ));
    }

    #[test]
    fn test_change_parameter_types_the_value() {
        let command = parse_command(&["changeParam", "p", "src", "rate", "2.5"]).unwrap();
        assert_eq!(command, ParameterChangeCommand::new("p", "src", "rate", 2.5).into());
    }

    #[test]
    fn test_shedding_enable_and_disable() {
        let command = parse_command(&["shedding", "p", "e", "random", "ratio", "0.1"]).unwrap();
        let Command::LoadShedding(c) = command else {
            panic!("expected load shedding");
        };
        assert_eq!(c.shedder.as_deref(), Some("random"));
        assert_eq!(c.parameters.get("ratio"), Some(&ParameterValue::Float(0.1)));

        let off = parse_command(&["shedding", "p", "e", "-"]).unwrap();
        assert_eq!(off, LoadSheddingCommand::disable("p", "e").into());
        assert!(parse_command(&["shedding", "p", "e", "none", "ratio", "1"]).is_err());
    }

    #[test]
    fn test_replay_start_with_window() {
        let command = parse_command(&[
            "replay",
            "p",
            "sink",
            "9",
            "true",
            "2024-01-01T00:00:00Z",
            "2024-01-01T01:00:00Z",
            "-2",
            "price",
            ">",
            "10",
        ])
        .unwrap();

        let Command::Replay(c) = command else {
            panic!("expected a replay");
        };
        assert!(c.start);
        assert_eq!(c.ticket, 9);
        let window = c.window.unwrap();
        assert_eq!(window.speed, -2.0);
        assert_eq!(window.query, "price > 10");
    }

    #[test]
    fn test_replay_errors() {
        assert!(parse_command(&["replay", "p", "s", "x", "true"]).is_err());
        assert!(parse_command(&["replay", "p", "s", "1", "true", "2024-01-01T00:00:00Z"]).is_err());
        assert!(matches!(
            parse_command(&[
                "replay",
                "p",
                "s",
                "1",
                "false",
                "2024-01-01T00:00:00Z",
                "2024-01-02T00:00:00Z",
                "1",
            ]),
            Err(CommandError::InvalidArgument(_))
        ));
        assert_eq!(
            parse_command(&["replay", "p", "s", "1", "false"]).unwrap(),
            ReplayCommand::stop("p", "s", 1).into()
        );
    }

    #[test]
    fn test_separator_builds_a_sequence() {
        let line = ["pipeline", "a", "start", ";", "pipeline", "b", "stop", ";"];
        let command = parse_command(&line).unwrap();
        assert_eq!(
            command,
            Command::Sequence(CommandSequence::new(vec![
                PipelineCommand::new("a", PipelineStatus::Start).into(),
                PipelineCommand::new("b", PipelineStatus::Stop).into(),
            ]))
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        assert!(matches!(parse_command(&["reboot"]), Err(CommandError::UnknownCommand(_))));
        assert!(matches!(parse_command(&[]), Err(CommandError::Parse(_))));
        assert!(matches!(parse_command(&[";"]), Err(CommandError::Parse(_))));
    }
}
