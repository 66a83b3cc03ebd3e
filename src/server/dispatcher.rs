//! # Dispatcher - Serialized Event Processing
//!
//! A single task owns the [`PollCoordinator`] and the [`ConnectionHub`] and
//! drains a queue of [`Command`]s one at a time. Socket tasks never touch the
//! poll directly; they only push commands through a [`DispatcherHandle`].
//!
//! ```text
//! socket task --Connect/Client/Disconnect--> [mpsc queue] --> Dispatcher
//!                                                              |- PollCoordinator (state)
//!                                                              |- ConnectionHub   (fan-out)
//! ```

use anyhow::{anyhow, Result};
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use crate::common::messages::{ClientMessage, Stats};
use crate::server::access::{AccessPolicy, Role};
use crate::server::coordinator::PollCoordinator;
use crate::server::hub::{ConnectionHub, Outbound};
use crate::server::ConnectionId;

/// Depth of the command queue shared by all connections.
const COMMAND_QUEUE_SIZE: usize = 1024;

/// Work items processed by the dispatcher, in arrival order.
#[derive(Debug)]
pub enum Command {
    /// A connection finished its handshake with a granted role
    Connect {
        id: ConnectionId,
        role: Role,
        outbound: Outbound,
    },
    /// A connection went away
    Disconnect { id: ConnectionId },
    /// A decoded event from a connection
    Client {
        id: ConnectionId,
        message: ClientMessage,
    },
    /// Read-only stats query (HTTP surface)
    Snapshot { reply: oneshot::Sender<Stats> },
}

pub struct Dispatcher {
    coordinator: PollCoordinator,
    hub: ConnectionHub,
    policy: AccessPolicy,
    commands: mpsc::Receiver<Command>,
}

impl Dispatcher {
    /// Start the dispatcher task. Must be called from within a Tokio runtime.
    pub fn spawn(coordinator: PollCoordinator, policy: AccessPolicy) -> DispatcherHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let dispatcher = Self {
            coordinator,
            hub: ConnectionHub::new(),
            policy,
            commands: rx,
        };
        tokio::spawn(dispatcher.run());
        DispatcherHandle { tx }
    }

    /// Runs until every [`DispatcherHandle`] has been dropped.
    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        debug!("Dispatcher stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Connect { id, role, outbound } => {
                self.hub.register(id, role, outbound);
                debug!("Registered {} ({} open connections)", id, self.hub.len());
                self.coordinator.on_connect(id, role, &mut self.hub);
            }
            Command::Disconnect { id } => match self.hub.unregister(&id) {
                Some(role) => {
                    if self.hub.is_empty() {
                        debug!("Last connection {} closed", id);
                    } else {
                        debug!("Unregistered {} ({} open connections)", id, self.hub.len());
                    }
                    self.coordinator.on_disconnect(id, role, &mut self.hub);
                }
                None => debug!("Disconnect for unknown connection {}", id),
            },
            Command::Client { id, message } => {
                let Some(role) = self.hub.role_of(&id) else {
                    debug!("Event from unknown connection {}", id);
                    return;
                };
                if message.is_admin() && !self.policy.may_administer(role) {
                    warn!(
                        "Ignoring {} from {} connection {}",
                        message.event_name(),
                        role.as_str(),
                        id
                    );
                    return;
                }
                self.coordinator.handle(id, message, &mut self.hub);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.coordinator.stats());
            }
        }
    }
}

/// Cloneable sender side used by socket tasks and HTTP handlers.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    pub async fn connect(&self, id: ConnectionId, role: Role, outbound: Outbound) -> Result<()> {
        self.send(Command::Connect { id, role, outbound }).await
    }

    pub async fn disconnect(&self, id: ConnectionId) -> Result<()> {
        self.send(Command::Disconnect { id }).await
    }

    pub async fn submit(&self, id: ConnectionId, message: ClientMessage) -> Result<()> {
        self.send(Command::Client { id, message }).await
    }

    pub async fn snapshot(&self) -> Result<Stats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        Ok(rx.await?)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow!("dispatcher is not running"))
    }
}
