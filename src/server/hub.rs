use log::debug;
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::common::messages::ServerMessage;
use crate::server::access::Role;
use crate::server::coordinator::Transport;
use crate::server::ConnectionId;

/// Outbound queue of a single connection, drained by its socket writer task.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

struct Peer {
    role: Role,
    tx: Outbound,
}

/// Registry of live connections: id -> (granted role, outbound queue).
#[derive(Default)]
pub struct ConnectionHub {
    peers: HashMap<ConnectionId, Peer>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId, role: Role, tx: Outbound) {
        self.peers.insert(id, Peer { role, tx });
    }

    /// Drop a connection, returning the role it was registered with.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Role> {
        self.peers.remove(id).map(|peer| peer.role)
    }

    pub fn role_of(&self, id: &ConnectionId) -> Option<Role> {
        self.peers.get(id).map(|peer| peer.role)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Transport for ConnectionHub {
    fn send_to(&mut self, id: ConnectionId, message: ServerMessage) {
        if let Some(peer) = self.peers.get(&id) {
            if peer.tx.send(message).is_err() {
                debug!("Dropping event for closed connection {}", id);
            }
        }
    }

    fn broadcast(&mut self, message: ServerMessage) {
        for (id, peer) in &self.peers {
            if peer.tx.send(message.clone()).is_err() {
                debug!("Dropping event for closed connection {}", id);
            }
        }
    }
}
