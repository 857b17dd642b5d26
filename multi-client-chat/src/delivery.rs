//! Best-effort delivery of rendered messages to sessions.
//!
//! Every session owns an [`Outbox`]: the sending half of a bounded queue
//! drained by that connection's writer task. Enqueueing never blocks the
//! server loop. When a peer stops reading and its queue fills up, further
//! messages are dropped and counted; the writer tells the peer how many it
//! missed once the queue moves again.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::{
    message::ServerMessage,
    registry::{Registry, Session, SessionId},
};

/// Messages queued for one connection before new ones are dropped.
pub const OUTBOX_DEPTH: usize = 128;

/// Connection handle stored in the registry. Dropping it closes the
/// connection once the writer has flushed what was already queued.
#[derive(Debug)]
pub struct Outbox {
    peer: SocketAddr,
    queue: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl Outbox {
    pub fn new(peer: SocketAddr) -> (Self, Pending) {
        Self::with_depth(peer, OUTBOX_DEPTH)
    }

    pub fn with_depth(peer: SocketAddr, depth: usize) -> (Self, Pending) {
        let (queue, receiver) = mpsc::channel(depth);
        let dropped = Arc::new(AtomicU64::new(0));
        let outbox = Self {
            peer,
            queue,
            dropped: Arc::clone(&dropped),
        };
        (outbox, Pending { receiver, dropped })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

/// Receiving half of an [`Outbox`], owned by the connection's writer.
#[derive(Debug)]
pub struct Pending {
    receiver: mpsc::Receiver<String>,
    dropped: Arc<AtomicU64>,
}

impl Pending {
    /// Next text to write. Once the backlog has drained, a notice counting
    /// the messages dropped meanwhile is appended. Returns `None` once the
    /// outbox is gone and the queue is empty.
    pub async fn next(&mut self) -> Option<String> {
        let text = self.receiver.recv().await?;
        if !self.receiver.is_empty() {
            return Some(text);
        }
        match self.dropped.swap(0, Ordering::Relaxed) {
            0 => Some(text),
            skipped => Some(format!("{text}{}", ServerMessage::Lagged { skipped })),
        }
    }
}

pub fn send_to(session: &Session<Outbox>, message: &ServerMessage) {
    deliver(session, message.to_string());
}

/// Sends `message` to every active session except `excluded`, in slot order.
pub fn broadcast_except(
    registry: &Registry<Outbox>,
    message: &ServerMessage,
    excluded: Option<SessionId>,
) {
    let text = message.to_string();
    for session in registry.iter().filter(|session| Some(session.id) != excluded) {
        deliver(session, text.clone());
    }
}

fn deliver(session: &Session<Outbox>, text: String) {
    let outbox = &session.handle;
    match outbox.queue.try_send(text) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            let skipped = outbox.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            // One warning per burst; the count keeps climbing silently.
            if skipped == 1 {
                warn!(
                    id = %session.id,
                    name = %session.name,
                    peer = %outbox.peer,
                    "outbox full, dropping messages"
                );
            }
        }
        Err(TrySendError::Closed(_)) => {
            warn!(
                id = %session.id,
                name = %session.name,
                peer = %outbox.peer,
                "failed to deliver message"
            );
        }
    }
}
