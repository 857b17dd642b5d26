//! Parsing of received lines into chat commands.

/// One line received from a client, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    Command(Command<'a>),
    Chat(&'a str),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Name(&'a str),
    Msg { target: &'a str, text: &'a str },
    MsgUsage,
    List,
    Help,
    Unknown,
}

/// Lines starting with `/` are commands; anything else is chat with its
/// line ending stripped.
pub fn parse(line: &str) -> Input<'_> {
    if line.starts_with('/') {
        return Input::Command(parse_command(line));
    }

    match line.trim_end_matches(['\n', '\r']) {
        "" => Input::Empty,
        text => Input::Chat(text),
    }
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim_end_matches(['\n', '\r', ' ']);

    if let Some(name) = line.strip_prefix("/name ") {
        return Command::Name(name.trim_start_matches(' '));
    }

    if let Some(rest) = line.strip_prefix("/msg ") {
        // Names can not contain spaces, so the first one ends the target.
        return match rest.split_once(' ') {
            Some((target, text)) => Command::Msg { target, text },
            None => Command::MsgUsage,
        };
    }

    match line {
        "/list" => Command::List,
        "/help" => Command::Help,
        _ => Command::Unknown,
    }
}
