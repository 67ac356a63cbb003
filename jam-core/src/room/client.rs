use std::fmt::Display;

use crossbeam::atomic::AtomicCell;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use log::{info, warn};
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};

use crate::{Config, Id};

use super::Room;

pub type ClientId = Id<Client>;

/// A frame on a subscriber connection, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Why a client stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// The remote end closed the connection
    Closed,
    /// The room released the client, either because it closed or because the client was too slow
    Released,
    /// The remote end did not answer pings in time
    TimedOut,
    /// The connection failed
    Error(String),
}

/// A subscriber of a [Room], which owns a bounded queue of outbound frames.
pub struct Client {
    id: ClientId,
    room: Room,
    config: Config,
    outbound: mpsc::Receiver<Frame>,
}

impl Client {
    pub(super) fn new(room: &Room, outbound: mpsc::Receiver<Frame>) -> Self {
        Self {
            id: ClientId::new(),
            room: room.clone(),
            config: room.config().clone(),
            outbound,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Drives the client over a connection until either side gives up,
    /// then unregisters it from the room.
    ///
    /// The reader half forwards inbound text to the room and records pongs.
    /// The writer half drains the outbound queue and pings the remote end.
    /// Both halves are polled concurrently within the calling task, and the
    /// first one to finish ends the other.
    pub async fn run<Si, St, E>(self, sink: Si, stream: St) -> Disconnect
    where
        Si: Sink<Frame> + Unpin,
        Si::Error: Display,
        St: Stream<Item = Result<Frame, E>> + Unpin,
        E: Display,
    {
        let Self {
            id,
            room,
            config,
            outbound,
        } = self;

        let last_pong = AtomicCell::new(Instant::now());

        let reason = tokio::select! {
            reason = read_half(id, &room, stream, &last_pong) => reason,
            reason = write_half(&config, sink, outbound, &last_pong) => reason,
        };

        room.unregister(id);
        info!("Client {} disconnected: {:?}", id, reason);

        reason
    }

    #[cfg(test)]
    pub(crate) async fn next_outbound(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }
}

async fn read_half<St, E>(
    id: ClientId,
    room: &Room,
    mut stream: St,
    last_pong: &AtomicCell<Instant>,
) -> Disconnect
where
    St: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Frame::Text(text)) => room.inbound(id, text),
            Ok(Frame::Pong(_)) => last_pong.store(Instant::now()),
            // The transport answers pings on its own
            Ok(Frame::Ping(_)) => {}
            Ok(Frame::Close) => return Disconnect::Closed,
            Err(e) => {
                warn!("Client {} read failed: {}", id, e);
                return Disconnect::Error(e.to_string());
            }
        }
    }

    Disconnect::Closed
}

async fn write_half<Si>(
    config: &Config,
    mut sink: Si,
    mut outbound: mpsc::Receiver<Frame>,
    last_pong: &AtomicCell<Instant>,
) -> Disconnect
where
    Si: Sink<Frame> + Unpin,
    Si::Error: Display,
{
    let start = Instant::now() + config.ping_interval;
    let mut ping = time::interval_at(start, config.ping_interval);
    ping.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // The room let go of this client, so anything queued has been sent
                    let _ = sink.send(Frame::Close).await;
                    let _ = sink.close().await;

                    return Disconnect::Released;
                };

                if let Err(e) = sink.send(frame).await {
                    return Disconnect::Error(e.to_string());
                }
            }
            _ = ping.tick() => {
                if last_pong.load().elapsed() > config.pong_deadline {
                    let _ = sink.close().await;
                    return Disconnect::TimedOut;
                }

                if let Err(e) = sink.send(Frame::Ping(vec![])).await {
                    return Disconnect::Error(e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::{convert::Infallible, time::Duration};

    use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

    use super::*;
    use crate::{Notification, NotificationKind};

    type Remote = (UnboundedSender<Result<Frame, Infallible>>, UnboundedReceiver<Frame>);

    /// Attaches a client to an in-memory connection and returns the remote end
    fn connect(room: &Room) -> (Remote, tokio::task::JoinHandle<Disconnect>) {
        let (to_client, client_inbound) = unbounded();
        let (client_outbound, from_client) = unbounded();

        let client = room.register();
        let handle = tokio::spawn(client.run(client_outbound, client_inbound));

        ((to_client, from_client), handle)
    }

    #[tokio::test]
    async fn test_client_receives_broadcasts() {
        let room = Room::new("CLNT1", &Config::default());
        let ((_to_client, mut from_client), _handle) = connect(&room);

        // Wait for the registration to go through before broadcasting
        while room.client_count().await == 0 {
            tokio::task::yield_now().await;
        }

        let notification = Notification::new(NotificationKind::Jam, &"hello");
        room.broadcast(notification.clone());

        assert_eq!(
            from_client.next().await,
            Some(Frame::Text(notification.to_text())),
            "broadcast is written to the connection"
        );
    }

    #[tokio::test]
    async fn test_remote_close_unregisters() {
        let room = Room::new("CLNT2", &Config::default());
        let ((to_client, _from_client), handle) = connect(&room);

        to_client
            .unbounded_send(Ok(Frame::Text("hi".to_string())))
            .expect("client is listening");
        to_client
            .unbounded_send(Ok(Frame::Close))
            .expect("client is listening");

        let reason = handle.await.expect("client task finishes");

        assert_eq!(reason, Disconnect::Closed, "remote closed");
        assert_eq!(room.client_count().await, 0, "client was unregistered");
    }

    #[tokio::test]
    async fn test_room_close_releases_client() {
        let room = Room::new("CLNT3", &Config::default());
        let ((_to_client, mut from_client), handle) = connect(&room);

        room.close().await;

        assert_eq!(
            from_client.next().await,
            Some(Frame::Text(Notification::close().to_text())),
            "client is told about the close"
        );
        assert_eq!(from_client.next().await, Some(Frame::Close), "connection is closed");
        assert_eq!(
            handle.await.expect("client task finishes"),
            Disconnect::Released,
            "client was released by the room"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_pings_time_out() {
        let config = Config {
            ping_interval: Duration::from_secs(1),
            pong_deadline: Duration::from_millis(1500),
            ..Default::default()
        };

        let room = Room::new("CLNT4", &config);
        let ((_to_client, mut from_client), handle) = connect(&room);

        assert_eq!(from_client.next().await, Some(Frame::Ping(vec![])), "client pings");

        let reason = handle.await.expect("client task finishes");
        assert_eq!(reason, Disconnect::TimedOut, "missing pong closes the client");
    }
}
