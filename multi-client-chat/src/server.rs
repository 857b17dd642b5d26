use std::{future::Future, io, net::SocketAddr};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        TcpListener, TcpSocket, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
    sync::mpsc,
    task::JoinSet,
};
use tracing::{debug, info, warn};

use crate::{
    command::{self, Command, Input},
    delivery::{Outbox, Pending, broadcast_except, send_to},
    message::{BUFFER_SIZE, ServerMessage, read_line, write_text},
    registry::{DEFAULT_MAX_CLIENTS, Registry, RegistryFull, SessionId},
};

/// Pending connections the kernel queues before `accept`.
const LISTEN_BACKLOG: u32 = 10;

/// Received lines waiting for the server loop before readers are paused.
const EVENT_QUEUE: usize = 128;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    pub fn new(listener: TcpListener, config: ServerConfig) -> Self {
        Self { listener, config }
    }

    pub fn bind(addr: SocketAddr, config: ServerConfig) -> Result<Self> {
        listen(addr).map(|listener| Self::new(listener, config))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the readiness loop until `shutdown` resolves. New connections are
    /// serviced before client lines within a cycle.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server { listener, config } = self;
        let (events, mut incoming) = mpsc::channel(EVENT_QUEUE);
        let mut hub = Hub::new(config, events);
        tokio::pin!(shutdown);

        loop {
            select! {
                biased;
                _ = &mut shutdown => {
                    info!("chat server shutting down");
                    break;
                }
                accept_result = listener.accept() => hub.accept(accept_result),
                Some(event) = incoming.recv() => hub.dispatch(event),
                Some(_) = hub.readers.join_next(), if !hub.readers.is_empty() => {}
            }
        }

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

/// Binds a listener with address reuse enabled so a restarted server can
/// take the port straight back.
pub fn listen(addr: SocketAddr) -> Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .context("socket error")?;
    socket.set_reuseaddr(true).context("setsockopt error")?;
    socket
        .bind(addr)
        .with_context(|| format!("bind error on {addr}"))?;
    socket.listen(LISTEN_BACKLOG).context("listen error")
}

/// What a connection's reader reports back to the server loop.
#[derive(Debug)]
enum Event {
    Line { id: SessionId, line: String },
    Closed { id: SessionId, error: Option<io::Error> },
}

/// Sole owner of the registry. Every mutation happens on the server loop.
struct Hub {
    registry: Registry<Outbox>,
    events: mpsc::Sender<Event>,
    readers: JoinSet<()>,
}

impl Hub {
    fn new(config: ServerConfig, events: mpsc::Sender<Event>) -> Self {
        Self {
            registry: Registry::with_capacity(config.max_clients),
            events,
            readers: JoinSet::new(),
        }
    }

    fn accept(&mut self, result: io::Result<(TcpStream, SocketAddr)>) {
        let (stream, peer) = match result {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = ?err, "accept error");
                return;
            }
        };

        let (outbox, pending) = Outbox::new(peer);
        let (id, name) = match self.registry.add(outbox) {
            Ok(session) => (session.id, session.name.clone()),
            Err(RegistryFull(_)) => {
                info!(%peer, "connection refused: server full");
                tokio::spawn(reject_full(stream, peer));
                return;
            }
        };

        let (reader, writer) = stream.into_split();
        tokio::spawn(drain_outbox(writer, pending, peer));
        self.readers.spawn(read_lines(reader, id, self.events.clone()));

        info!(%peer, %id, %name, "new connection");
        if let Some(session) = self.registry.get(id) {
            send_to(session, &ServerMessage::Welcome { name: name.clone() });
        }
        broadcast_except(&self.registry, &ServerMessage::Joined { name }, Some(id));
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Line { id, line } => self.handle_line(id, &line),
            Event::Closed { id, error } => self.disconnect(id, error),
        }
    }

    fn handle_line(&mut self, id: SessionId, line: &str) {
        // Lines already queued by a reader whose session is gone are dropped.
        let Some(name) = self.registry.get(id).map(|session| session.name.clone()) else {
            return;
        };

        match command::parse(line) {
            Input::Empty => {}
            Input::Chat(text) => {
                info!("[{name}]: {text}");
                let message = ServerMessage::Chat {
                    name,
                    text: text.to_string(),
                };
                broadcast_except(&self.registry, &message, Some(id));
            }
            Input::Command(command) => self.execute(id, name, command),
        }
    }

    fn execute(&mut self, id: SessionId, name: String, command: Command<'_>) {
        match command {
            Command::Name(new_name) => self.rename(id, new_name),
            Command::Msg { target, text } => self.private_message(id, name, target, text),
            Command::MsgUsage => self.reply(id, &ServerMessage::MsgUsage),
            Command::List => {
                let names: Vec<String> = self.registry.iter().map(|s| s.name.clone()).collect();
                let you = self
                    .registry
                    .iter()
                    .position(|session| session.id == id)
                    .unwrap_or(names.len());
                self.reply(id, &ServerMessage::UserList { names, you });
            }
            Command::Help => self.reply(id, &ServerMessage::Help),
            Command::Unknown => self.reply(id, &ServerMessage::UnknownCommand),
        }
    }

    fn rename(&mut self, id: SessionId, new_name: &str) {
        match self.registry.rename(id, new_name) {
            Ok(old) => {
                info!(%id, %old, new = new_name, "user renamed");
                let announcement = ServerMessage::Renamed {
                    old,
                    new: new_name.to_string(),
                };
                broadcast_except(&self.registry, &announcement, None);
                self.reply(id, &ServerMessage::RenameAccepted);
            }
            Err(err) => {
                debug!(%id, error = %err, "rename rejected");
                self.reply(id, &ServerMessage::Error(err.to_string()));
            }
        }
    }

    fn private_message(&self, id: SessionId, sender: String, target: &str, text: &str) {
        let Some(recipient) = self.registry.find_by_name(target) else {
            self.reply(id, &ServerMessage::UserNotFound);
            return;
        };

        send_to(
            recipient,
            &ServerMessage::PrivateFrom {
                name: sender,
                text: text.to_string(),
            },
        );
        let confirmation = ServerMessage::PrivateTo {
            name: recipient.name.clone(),
            text: text.to_string(),
        };
        self.reply(id, &confirmation);
    }

    fn reply(&self, id: SessionId, message: &ServerMessage) {
        if let Some(session) = self.registry.get(id) {
            send_to(session, message);
        }
    }

    fn disconnect(&mut self, id: SessionId, error: Option<io::Error>) {
        if let Some(err) = error {
            warn!(%id, error = ?err, "recv error");
        }

        // Dropping the session closes its outbox, which ends the writer.
        let Some(session) = self.registry.remove(id) else {
            return;
        };
        info!(peer = %session.handle.peer(), %id, name = %session.name, "client disconnected");
        broadcast_except(
            &self.registry,
            &ServerMessage::Left { name: session.name },
            None,
        );
    }
}

async fn read_lines(reader: OwnedReadHalf, id: SessionId, events: mpsc::Sender<Event>) {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, reader);
    let mut buf = Vec::with_capacity(BUFFER_SIZE);

    loop {
        let (event, closed) = match read_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => (Event::Line { id, line }, false),
            Ok(None) => (Event::Closed { id, error: None }, true),
            Err(err) => (Event::Closed { id, error: Some(err) }, true),
        };

        if events.send(event).await.is_err() || closed {
            break;
        }
    }
}

async fn drain_outbox(
    mut writer: OwnedWriteHalf,
    mut pending: Pending,
    peer: SocketAddr,
) {
    while let Some(text) = pending.next().await {
        if let Err(err) = write_text(&mut writer, &text).await {
            debug!(%peer, ?err, "send error");
            return;
        }
    }

    if let Err(err) = writer.shutdown().await {
        debug!(%peer, ?err, "failed to shut down connection cleanly");
    }
}

async fn reject_full(mut stream: TcpStream, peer: SocketAddr) {
    let notice = ServerMessage::ServerFull.to_string();
    if let Err(err) = write_text(&mut stream, &notice).await {
        debug!(%peer, ?err, "failed to send server full notice");
    }
    if let Err(err) = stream.shutdown().await {
        debug!(%peer, ?err, "failed to shut down rejected connection");
    }
}
