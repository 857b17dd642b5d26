use std::{fmt, io};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Receive buffer capacity, terminator included.
pub const BUFFER_SIZE: usize = 4096;

/// Largest payload delivered by a single [`read_line`] call.
pub const MAX_PAYLOAD: usize = BUFFER_SIZE - 1;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Everything the chat server writes to a client. `Display` renders the
/// exact wire text, trailing newline included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Welcome { name: String },
    Joined { name: String },
    Left { name: String },
    Renamed { old: String, new: String },
    RenameAccepted,
    Chat { name: String, text: String },
    PrivateFrom { name: String, text: String },
    PrivateTo { name: String, text: String },
    UserList { names: Vec<String>, you: usize },
    Help,
    Error(String),
    MsgUsage,
    UserNotFound,
    UnknownCommand,
    ServerFull,
    Lagged { skipped: u64 },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Welcome { name } => write!(
                f,
                "Welcome to the chat! Your username is: {name}\nType /help for commands\n"
            ),
            ServerMessage::Joined { name } => writeln!(f, "*** {name} has joined the chat ***"),
            ServerMessage::Left { name } => writeln!(f, "*** {name} has left the chat ***"),
            ServerMessage::Renamed { old, new } => {
                writeln!(f, "*** {old} is now known as {new} ***")
            }
            ServerMessage::RenameAccepted => writeln!(f, "Username changed successfully"),
            ServerMessage::Chat { name, text } => writeln!(f, "[{name}]: {text}"),
            ServerMessage::PrivateFrom { name, text } => writeln!(f, "[PM from {name}]: {text}"),
            ServerMessage::PrivateTo { name, text } => writeln!(f, "[PM to {name}]: {text}"),
            ServerMessage::UserList { names, you } => {
                writeln!(f, "\n=== Online Users ===")?;
                for (index, name) in names.iter().enumerate() {
                    if index == *you {
                        writeln!(f, "[{name}] (you)")?;
                    } else {
                        writeln!(f, "[{name}]")?;
                    }
                }
                writeln!(f, "====================")
            }
            ServerMessage::Help => f.write_str(concat!(
                "\n=== Commands ===\n",
                "/name <username>  - Change your username\n",
                "/msg <user> <msg> - Send private message\n",
                "/list             - List online users\n",
                "/help             - Show this help\n",
                "================\n",
            )),
            ServerMessage::Error(message) => writeln!(f, "{message}"),
            ServerMessage::MsgUsage => writeln!(f, "Usage: /msg <username> <message>"),
            ServerMessage::UserNotFound => writeln!(f, "User not found"),
            ServerMessage::UnknownCommand => {
                writeln!(f, "Unknown command. Type /help for commands")
            }
            ServerMessage::ServerFull => writeln!(f, "Server full. Try again later."),
            ServerMessage::Lagged { skipped } => writeln!(
                f,
                "*** you are behind by {skipped} messages; some were dropped ***"
            ),
        }
    }
}

/// Reads one newline-terminated line, or at most [`MAX_PAYLOAD`] bytes of a
/// longer one. Returns `None` at end of stream. The terminator is kept so
/// callers decide how much to trim; invalid UTF-8 is replaced lossily.
///
/// Bytes of an unfinished line stay in `buf`, so the call can be raced in
/// `select!` and resumed without losing data.
pub async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let room = MAX_PAYLOAD.saturating_sub(buf.len()) as u64;
    (&mut *reader).take(room).read_until(b'\n', buf).await?;
    if buf.is_empty() {
        return Ok(None);
    }

    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    Ok(Some(line))
}

/// Strips trailing line endings only.
pub fn trim_line_ending(line: &str) -> &str {
    line.trim_end_matches(LINE_ENDINGS)
}

pub async fn write_text<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}
