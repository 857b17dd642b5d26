//! Plain request/acknowledge pair used to poke at raw TCP behaviour.
//!
//! The echo server serves one peer at a time: it logs every chunk it
//! receives together with a hex dump and answers with the chunk length.

use std::{future::Future, io, net::SocketAddr};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{info, warn};

use crate::{
    cli::ClientArgs,
    client::write_stdout,
    hex::hex_dump,
    message::{BUFFER_SIZE, MAX_PAYLOAD, trim_line_ending, write_text},
    server::listen,
};

pub struct EchoServer {
    listener: TcpListener,
}

impl EchoServer {
    pub fn new(listener: TcpListener) -> Self {
        Self { listener }
    }

    pub fn bind(addr: SocketAddr) -> Result<Self> {
        listen(addr).map(Self::new)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let EchoServer { listener } = self;
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(error = ?err, "accept error");
                        continue;
                    }
                },
            };

            info!(%peer, "connection to client");
            select! {
                _ = &mut shutdown => break,
                served = serve_peer(stream) => {
                    if let Err(err) = served {
                        warn!(%peer, error = ?err, "recv error");
                    }
                    info!(%peer, "connection closed");
                }
            }
        }

        info!("echo server shutting down");
        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

/// Reply sent for every received chunk.
pub fn acknowledgement(bytes: usize) -> String {
    format!("Message received ({bytes} bytes)")
}

async fn serve_peer(mut stream: TcpStream) -> io::Result<()> {
    let mut buf = [0u8; BUFFER_SIZE];

    loop {
        let n = stream.read(&mut buf[..MAX_PAYLOAD]).await?;
        if n == 0 {
            info!("client disconnected");
            return Ok(());
        }

        let received = &buf[..n];
        info!(text = %String::from_utf8_lossy(received), "client says");
        info!(hex = %hex_dump(received), "hex dump");
        write_text(&mut stream, &acknowledgement(n)).await?;
    }
}

pub async fn run_client(args: ClientArgs) -> Result<()> {
    let mut stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("connection to {} failed", args.server))?;

    write_stdout(&format!(
        "Connected to server at {}\nType messages to send (type 'quit' to exit):\n\n",
        args.server
    ))
    .await?;

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    let mut buf = [0u8; BUFFER_SIZE];

    loop {
        write_stdout("You: ").await?;
        input.clear();
        if stdin.read_line(&mut input).await? == 0 {
            break;
        }

        let text = trim_line_ending(&input);
        if text == "quit" {
            write_stdout("Closing connection...\n").await?;
            break;
        }
        if text.is_empty() {
            continue;
        }

        write_text(&mut stream, text).await.context("send error")?;
        let n = stream
            .read(&mut buf[..MAX_PAYLOAD])
            .await
            .context("recv error")?;
        if n == 0 {
            write_stdout("Server closed connection\n").await?;
            break;
        }

        write_stdout(&format!(
            "Server: {}\n\n",
            String::from_utf8_lossy(&buf[..n])
        ))
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acknowledgement_reports_the_byte_count() {
        assert_eq!(acknowledgement(5), "Message received (5 bytes)");
    }
}
