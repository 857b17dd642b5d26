use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::{registry::DEFAULT_MAX_CLIENTS, server::ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the multi-client chat server.
    Server(ServerArgs),
    /// Connect to a chat server and chat from the terminal.
    Client(ClientArgs),
    /// Run the single-peer echo server that acknowledges every chunk it receives.
    EchoServer(EchoServerArgs),
    /// Send stdin lines to an echo server and print its replies.
    EchoClient(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Socket address to listen on. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:6969")]
    pub listen: SocketAddr,

    /// Maximum number of concurrently connected clients.
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS)]
    pub max_clients: usize,
}

impl ServerArgs {
    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            max_clients: self.max_clients,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EchoServerArgs {
    /// Socket address to listen on. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:6969")]
    pub listen: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Address of the server to connect to.
    #[arg(long, default_value = "127.0.0.1:6969")]
    pub server: SocketAddr,
}
