// Interactive commands for the glowplay binary
// One command per stdin line, words separated by whitespace

use crate::library::{CategoryFilter, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play(TrackId),
    /// Toggle the given track, or the current one when omitted
    Toggle(Option<TrackId>),
    Next,
    Previous,
    Seek(f64),
    Forward(Option<f64>),
    Rewind(Option<f64>),
    Stop,
    Category(CategoryFilter),
    List,
    Search(String),
    Status,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("'{0}' is not a number")]
    InvalidNumber(String),

    #[error("unknown category '{0}' (all, library, external, favorites)")]
    UnknownCategory(String),
}

pub const HELP: &str = "\
commands:
  play <id>          play a track by id
  toggle [id]        play/pause (current track if no id)
  next | prev        move through the track list
  seek <percent>     jump to a position, 0-100
  ff [s] | rw [s]    skip forward/back (default from config)
  stop               stop and release
  category <name>    all, library, external, favorites
  list               show the track list
  search <query>     search title, artist, genre
  status             show what is playing
  quit";

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    if word.is_empty() {
        return Err(CommandError::Empty);
    }
    let arg = (!rest.is_empty()).then_some(rest);

    match word.to_lowercase().as_str() {
        "play" | "p" => arg
            .map(|id| Command::Play(TrackId::from(id)))
            .ok_or(CommandError::MissingArgument("play")),
        "toggle" | "t" | "pause" => Ok(Command::Toggle(arg.map(TrackId::from))),
        "next" | "n" => Ok(Command::Next),
        "prev" | "previous" | "b" => Ok(Command::Previous),
        "seek" => {
            let percent = arg.ok_or(CommandError::MissingArgument("seek"))?;
            Ok(Command::Seek(parse_number(percent.trim_end_matches('%'))?))
        }
        "ff" | "forward" => Ok(Command::Forward(arg.map(parse_number).transpose()?)),
        "rw" | "rewind" => Ok(Command::Rewind(arg.map(parse_number).transpose()?)),
        "stop" | "s" => Ok(Command::Stop),
        "category" | "cat" => {
            let name = arg.ok_or(CommandError::MissingArgument("category"))?;
            CategoryFilter::parse(name)
                .map(Command::Category)
                .ok_or_else(|| CommandError::UnknownCategory(name.to_string()))
        }
        "list" | "ls" => Ok(Command::List),
        "search" | "/" => arg
            .map(|q| Command::Search(q.to_string()))
            .ok_or(CommandError::MissingArgument("search")),
        "status" | "?" => Ok(Command::Status),
        "help" | "h" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_number(text: &str) -> Result<f64, CommandError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_playback_commands() {
        assert_eq!(parse_command("play 42"), Ok(Command::Play(TrackId::from("42"))));
        assert_eq!(
            parse_command("  play external-My Song.mp3 "),
            Ok(Command::Play(TrackId::from("external-My Song.mp3")))
        );
        assert_eq!(parse_command("toggle"), Ok(Command::Toggle(None)));
        assert_eq!(parse_command("t 7"), Ok(Command::Toggle(Some(TrackId::from("7")))));
        assert_eq!(parse_command("NEXT"), Ok(Command::Next));
        assert_eq!(parse_command("prev"), Ok(Command::Previous));
        assert_eq!(parse_command("stop"), Ok(Command::Stop));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_positions() {
        assert_eq!(parse_command("seek 50"), Ok(Command::Seek(50.0)));
        assert_eq!(parse_command("seek 12.5%"), Ok(Command::Seek(12.5)));
        assert_eq!(parse_command("ff"), Ok(Command::Forward(None)));
        assert_eq!(parse_command("rw 30"), Ok(Command::Rewind(Some(30.0))));
        assert_eq!(
            parse_command("seek half"),
            Err(CommandError::InvalidNumber("half".into()))
        );
        assert_eq!(parse_command("seek"), Err(CommandError::MissingArgument("seek")));
        assert!(parse_command("ff inf").is_err());
    }

    #[test]
    fn test_parse_library_commands() {
        assert_eq!(parse_command("category ext"), Ok(Command::Category(CategoryFilter::External)));
        assert_eq!(
            parse_command("category jazz"),
            Err(CommandError::UnknownCategory("jazz".into()))
        );
        assert_eq!(parse_command("search night drive"), Ok(Command::Search("night drive".into())));
        assert_eq!(parse_command("list"), Ok(Command::List));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_command("   "), Err(CommandError::Empty));
        assert_eq!(parse_command("dance"), Err(CommandError::Unknown("dance".into())));
        assert_eq!(parse_command("play"), Err(CommandError::MissingArgument("play")));
    }
}
