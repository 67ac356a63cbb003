//! Fan-out of session notifications to real-time subscribers.
//!
//! All mutations of the client set and all broadcasts go through one actor task,
//! so a broadcast never races with a client being added or removed.

mod client;
mod notification;

use std::{collections::HashMap, sync::Arc};

use log::{debug, info, warn};
use tokio::sync::{
    mpsc::{self, error::TrySendError, UnboundedReceiver, UnboundedSender},
    oneshot,
};

pub use client::*;
pub use notification::*;

use crate::Config;

enum RoomCommand {
    Register {
        client_id: ClientId,
        outbound: mpsc::Sender<Frame>,
    },
    Unregister {
        client_id: ClientId,
    },
    Broadcast(Notification),
    Inbound {
        client_id: ClientId,
        text: String,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

/// A handle to the notification room of one session.
#[derive(Clone)]
pub struct Room {
    name: Arc<str>,
    config: Config,
    commands: UnboundedSender<RoomCommand>,
}

impl Room {
    /// Creates a room and spawns its actor on the current tokio runtime.
    pub fn new(name: &str, config: &Config) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();

        let room = Self {
            name: name.into(),
            config: config.clone(),
            commands,
        };

        tokio::spawn(run_room(room.name.clone(), receiver));
        room
    }

    /// Admits a new subscriber and returns it. The subscriber is not attached to a connection yet.
    ///
    /// If the room is closed, the returned client shuts down as soon as it runs.
    pub fn register(&self) -> Client {
        let (outbound, receiver) = mpsc::channel(self.config.client_buffer_size.max(1));
        let client = Client::new(self, receiver);

        self.send(RoomCommand::Register {
            client_id: client.id(),
            outbound,
        });

        client
    }

    /// Removes a subscriber. Removing one that is already gone does nothing.
    pub fn unregister(&self, client_id: ClientId) {
        self.send(RoomCommand::Unregister { client_id });
    }

    /// Delivers a notification to every registered subscriber.
    /// Subscribers that can't keep up are dropped instead of stalling the room.
    pub fn broadcast(&self, notification: Notification) {
        self.send(RoomCommand::Broadcast(notification));
    }

    /// Tells every subscriber the room is closing, disconnects them, and stops the room.
    /// Resolves once all subscribers have been released.
    pub async fn close(&self) {
        let (done, wait) = oneshot::channel();

        if self.commands.send(RoomCommand::Close { done }).is_ok() {
            // The actor drops `done` only if it stopped some other way
            let _ = wait.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// The number of registered subscribers, counted after every command sent before this call.
    pub async fn client_count(&self) -> usize {
        let (reply, count) = oneshot::channel();
        self.send(RoomCommand::Count { reply });

        count.await.unwrap_or_default()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn inbound(&self, client_id: ClientId, text: String) {
        self.send(RoomCommand::Inbound { client_id, text });
    }

    fn send(&self, command: RoomCommand) {
        // A closed room has no clients left to care about the command
        let _ = self.commands.send(command);
    }
}

async fn run_room(name: Arc<str>, mut receiver: UnboundedReceiver<RoomCommand>) {
    let mut clients: HashMap<ClientId, mpsc::Sender<Frame>> = HashMap::new();

    while let Some(command) = receiver.recv().await {
        match command {
            RoomCommand::Register {
                client_id,
                outbound,
            } => {
                clients.insert(client_id, outbound);
                info!("Client {} joined room {}", client_id, name);
            }
            RoomCommand::Unregister { client_id } => {
                if clients.remove(&client_id).is_some() {
                    info!("Client {} left room {}", client_id, name);
                }
            }
            RoomCommand::Broadcast(notification) => {
                let text = notification.to_text();

                clients.retain(|client_id, outbound| {
                    match outbound.try_send(Frame::Text(text.clone())) {
                        Ok(_) => true,
                        Err(TrySendError::Full(_)) => {
                            warn!("Dropping client {} from room {}: too slow", client_id, name);
                            false
                        }
                        Err(TrySendError::Closed(_)) => false,
                    }
                });
            }
            RoomCommand::Inbound { client_id, text } => {
                debug!("Client {} in room {} sent: {}", client_id, name, text);
            }
            RoomCommand::Count { reply } => {
                let _ = reply.send(clients.len());
            }
            RoomCommand::Close { done } => {
                let text = Notification::close().to_text();

                for outbound in clients.values() {
                    let _ = outbound.try_send(Frame::Text(text.clone()));
                }

                // Dropping the senders lets every writer drain and hang up
                clients.clear();
                receiver.close();

                info!("Room {} closed", name);
                let _ = done.send(());

                return;
            }
        }
    }
}
