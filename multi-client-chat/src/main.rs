use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use multi_client_chat::{
    cli::{Cli, Command},
    client,
    echo::{self, EchoServer},
    server::Server,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => {
            let server = Server::bind(args.listen, args.config())?;
            let addr = server.local_addr()?;
            info!("chat server listening on {}", addr);
            info!("max clients: {}", args.max_clients);
            if let Err(err) = server.run_until_ctrl_c().await {
                warn!("chat server exited with error: {err:?}");
                return Err(err);
            }
        }
        Command::Client(args) => client::run(args).await?,
        Command::EchoServer(args) => {
            let server = EchoServer::bind(args.listen)?;
            info!("echo server listening on {}", server.local_addr()?);
            server.run_until_ctrl_c().await?;
        }
        Command::EchoClient(args) => echo::run_client(args).await?,
    }

    Ok(())
}
