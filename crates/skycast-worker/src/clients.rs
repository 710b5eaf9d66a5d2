//! Registry of app clients connected to the worker.
//!
//! Stands in for the service worker's view of open pages: broadcast
//! targets for sync results, and the lookup used to resolve a
//! notification click to an existing client or a fresh one.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use skycast_offline::ClientMessage;

pub type ClientId = u64;

/// What a notification click resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// An existing client with a matching URL was focused.
    Focused(ClientId),
    /// No match; a new client should be opened at this URL.
    Opened(String),
}

struct ClientEntry {
    id: ClientId,
    url: String,
    sender: mpsc::UnboundedSender<ClientMessage>,
}

/// Connected clients, by insertion order.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<ClientEntry>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client at `url`; returns its id and message stream.
    pub fn connect(&self, url: &str) -> (ClientId, mpsc::UnboundedReceiver<ClientMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.clients.lock().push(ClientEntry {
            id,
            url: url.to_string(),
            sender,
        });
        tracing::debug!(id, url, "Client connected");
        (id, receiver)
    }

    pub fn disconnect(&self, id: ClientId) {
        self.clients.lock().retain(|c| c.id != id);
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Send a message to every connected client, dropping any whose
    /// receiver has gone away.
    pub fn broadcast(&self, message: &ClientMessage) {
        self.clients
            .lock()
            .retain(|c| c.sender.send(message.clone()).is_ok());
    }

    /// Focus the first client whose URL matches, or ask for a new one.
    pub fn focus_or_open(&self, url: &str) -> ClickAction {
        let clients = self.clients.lock();
        match clients.iter().find(|c| c.url == url) {
            Some(client) => ClickAction::Focused(client.id),
            None => ClickAction::Opened(url.to_string()),
        }
    }
}
