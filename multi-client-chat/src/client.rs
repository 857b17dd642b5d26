use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
};
use tracing::{info, warn};

use crate::{
    cli::ClientArgs,
    message::{BUFFER_SIZE, read_line, trim_line_ending, write_text},
};

pub async fn run(args: ClientArgs) -> Result<()> {
    let (mut reader, mut writer) = establish_connection(&args).await?;

    write_stdout(&format!(
        "Connected to chat server at {}\nType /help for commands, or just type to chat!\nType 'quit' to exit\n\n",
        args.server
    ))
    .await?;

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    let mut received = Vec::with_capacity(BUFFER_SIZE);

    run_client_loop(&mut reader, &mut writer, &mut stdin, &mut input, &mut received).await?;
    shutdown_connection(&mut writer).await;

    Ok(())
}

async fn establish_connection(
    args: &ClientArgs,
) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
    let stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("connection to {} failed", args.server))?;

    info!("connected to {}", args.server);

    let (reader, writer) = stream.into_split();
    Ok((BufReader::with_capacity(BUFFER_SIZE, reader), writer))
}

async fn run_client_loop(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    stdin: &mut BufReader<tokio::io::Stdin>,
    input: &mut String,
    received: &mut Vec<u8>,
) -> Result<()> {
    loop {
        select! {
            server_text = read_line(reader, received) => {
                if !handle_server_text(server_text).await? {
                    break;
                }
            }
            bytes_read = stdin.read_line(input) => {
                let keep_going = handle_stdin_input(bytes_read, input, writer).await?;
                input.clear();
                if !keep_going {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                handle_ctrl_c(ctrl_c);
                break;
            }
        }
    }
    Ok(())
}

async fn handle_server_text(text: io::Result<Option<String>>) -> Result<bool> {
    match text.context("recv error")? {
        Some(text) => {
            write_stdout(&text).await?;
            Ok(true)
        }
        None => {
            write_stdout("\nServer closed connection\n").await?;
            Ok(false)
        }
    }
}

async fn handle_stdin_input(
    bytes_read: io::Result<usize>,
    input: &str,
    writer: &mut OwnedWriteHalf,
) -> Result<bool> {
    let bytes_read = bytes_read?;
    if bytes_read == 0 {
        return Ok(false);
    }

    let text = trim_line_ending(input);
    if is_quit(text) {
        write_stdout("Disconnecting...\n").await?;
        return Ok(false);
    }

    if text.is_empty() {
        return Ok(true);
    }

    write_text(writer, &format!("{text}\n"))
        .await
        .context("send error")?;
    Ok(true)
}

fn is_quit(text: &str) -> bool {
    text == "quit" || text == "/quit"
}

fn handle_ctrl_c(result: io::Result<()>) {
    if let Err(error) = result {
        warn!(?error, "ctrl-c handler failed");
    }
}

async fn shutdown_connection(writer: &mut OwnedWriteHalf) {
    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shutdown client writer cleanly");
    }
}

pub(crate) async fn write_stdout(text: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_is_recognised_with_or_without_slash() {
        assert!(is_quit("quit"));
        assert!(is_quit("/quit"));
        assert!(!is_quit("quitting"));
        assert!(!is_quit("/QUIT"));
    }
}
