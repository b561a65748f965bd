//! Per-peer connection handling
//!
//! Every accepted peer runs one task that reads frames into the endpoint's
//! shared inbound queue and drains its own bounded outbound queue onto the
//! socket. A peer that fails is removed from the table; the other peers are
//! not affected.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};

use crate::error::Result;
use crate::protocol::{read_message, write_message, Message};
use crate::registry::{ControlFrame, ControlKind, Filter};
use crate::relay::EndpointRole;

/// Entry for one connected peer
#[derive(Debug)]
pub(crate) struct PeerEntry {
    /// Outbound queue, `high_water_mark` messages deep
    pub tx: mpsc::Sender<Message>,
    /// Filters this peer holds, with counts (subscriber-facing only)
    pub filters: HashMap<Filter, usize>,
}

impl PeerEntry {
    /// Check if this subscriber peer wants a topic
    pub fn wants(&self, topic: &[u8]) -> bool {
        self.filters.keys().any(|filter| filter.matches(topic))
    }
}

/// Mutable peer state of one endpoint
#[derive(Debug, Default)]
pub(crate) struct PeerState {
    /// Connected peers by session ID
    pub peers: HashMap<u64, PeerEntry>,
    /// Subscriptions sent upstream so far (publisher-facing only)
    pub upstream: HashMap<Filter, usize>,
}

impl PeerState {
    /// Record a control frame passing upstream
    pub fn track_upstream(&mut self, frame: &ControlFrame) {
        match frame.kind {
            ControlKind::Subscribe => {
                *self.upstream.entry(frame.filter.clone()).or_insert(0) += 1;
            }
            ControlKind::Unsubscribe => {
                if let Some(count) = self.upstream.get_mut(&frame.filter) {
                    *count -= 1;
                    if *count == 0 {
                        self.upstream.remove(&frame.filter);
                    }
                }
            }
        }
    }

    /// Subscribe frames bringing a new publisher up to date
    pub fn upstream_replay(&self) -> Vec<Message> {
        self.upstream
            .iter()
            .flat_map(|(filter, &count)| {
                let msg = ControlFrame {
                    kind: ControlKind::Subscribe,
                    filter: filter.clone(),
                }
                .to_message();
                std::iter::repeat(msg).take(count)
            })
            .collect()
    }
}

/// Peer table shared by an endpoint, its accept loop and its peer tasks
pub(crate) type PeerTable = Arc<RwLock<PeerState>>;

/// Everything a peer task needs besides its socket
pub(crate) struct PeerContext {
    pub id: u64,
    pub addr: SocketAddr,
    pub role: EndpointRole,
    pub table: PeerTable,
    pub inbound: mpsc::Sender<Result<Message>>,
    pub max_message_size: usize,
}

impl PeerContext {
    /// Run the peer until either direction ends
    ///
    /// `replay` is written before anything from the outbound queue.
    pub async fn run(self, socket: TcpStream, rx: mpsc::Receiver<Message>, replay: Vec<Message>) {
        let (mut reader, mut writer) = socket.into_split();

        let result = tokio::select! {
            res = self.read_loop(&mut reader) => res,
            res = write_loop(&mut writer, rx, replay) => res,
        };

        if let Err(e) = result {
            tracing::debug!(
                session_id = self.id,
                peer = %self.addr,
                error = %e,
                "Peer error"
            );
        }

        self.disconnect().await;
    }

    async fn read_loop(&self, reader: &mut OwnedReadHalf) -> Result<()> {
        while let Some(msg) = read_message(reader, self.max_message_size).await? {
            // Hold a queue slot before touching the filter table, so a
            // subscription is tracked only if the relay is certain to see it.
            let Ok(permit) = self.inbound.reserve().await else {
                // Endpoint dropped
                return Ok(());
            };

            if self.role == EndpointRole::SubscriberFacing && !self.track_subscription(&msg).await
            {
                continue;
            }

            permit.send(Ok(msg));
        }

        Ok(())
    }

    /// Update this peer's filters; returns false if the frame must not go upstream
    ///
    /// Malformed frames are passed on for the relay to count and drop. An
    /// unsubscribe for a filter this peer does not hold is swallowed here so
    /// it cannot release another peer's subscription.
    async fn track_subscription(&self, msg: &Message) -> bool {
        let Ok(frame) = ControlFrame::from_message(msg) else {
            return true;
        };

        let mut state = self.table.write().await;
        let Some(peer) = state.peers.get_mut(&self.id) else {
            return false;
        };

        match frame.kind {
            ControlKind::Subscribe => {
                *peer.filters.entry(frame.filter).or_insert(0) += 1;
                true
            }
            ControlKind::Unsubscribe => match peer.filters.get_mut(&frame.filter) {
                Some(count) => {
                    *count -= 1;
                    if *count == 0 {
                        peer.filters.remove(&frame.filter);
                    }
                    true
                }
                None => {
                    tracing::debug!(
                        session_id = self.id,
                        filter = %frame.filter,
                        "Ignoring unsubscribe for filter the peer does not hold"
                    );
                    false
                }
            },
        }
    }

    /// Remove the peer and release whatever it still subscribed to
    async fn disconnect(&self) {
        let removed = self.table.write().await.peers.remove(&self.id);

        if let Some(peer) = removed {
            for (filter, count) in peer.filters {
                let msg = ControlFrame {
                    kind: ControlKind::Unsubscribe,
                    filter,
                }
                .to_message();

                for _ in 0..count {
                    if self.inbound.send(Ok(msg.clone())).await.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            session_id = self.id,
            peer = %self.addr,
            role = %self.role,
            "Peer disconnected"
        );
    }
}

async fn write_loop(
    writer: &mut OwnedWriteHalf,
    mut rx: mpsc::Receiver<Message>,
    replay: Vec<Message>,
) -> Result<()> {
    for msg in &replay {
        write_message(writer, msg).await?;
    }

    while let Some(msg) = rx.recv().await {
        write_message(writer, &msg).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    /// Subscriber-facing peer 1, already registered in `table`
    async fn subscriber_peer(
        table: &PeerTable,
        inbound: mpsc::Sender<Result<Message>>,
    ) -> PeerContext {
        let (tx, _rx) = mpsc::channel(1);
        table.write().await.peers.insert(
            1,
            PeerEntry {
                tx,
                filters: HashMap::new(),
            },
        );

        PeerContext {
            id: 1,
            addr: "127.0.0.1:1".parse().unwrap(),
            role: EndpointRole::SubscriberFacing,
            table: Arc::clone(table),
            inbound,
            max_message_size: 1024,
        }
    }

    #[test]
    fn test_upstream_tracking_and_replay() {
        let mut state = PeerState::default();
        state.track_upstream(&ControlFrame::subscribe("a"));
        state.track_upstream(&ControlFrame::subscribe("a"));
        state.track_upstream(&ControlFrame::subscribe("b"));
        state.track_upstream(&ControlFrame::unsubscribe("b"));
        state.track_upstream(&ControlFrame::unsubscribe("never"));

        let replay = state.upstream_replay();
        assert_eq!(replay.len(), 2);
        assert!(replay
            .iter()
            .all(|msg| *msg == ControlFrame::subscribe("a").to_message()));
    }

    #[test]
    fn test_peer_wants() {
        let (tx, _rx) = mpsc::channel(1);
        let mut peer = PeerEntry {
            tx,
            filters: HashMap::new(),
        };
        assert!(!peer.wants(b"anything"));

        peer.filters.insert(Filter::new("news"), 1);
        assert!(peer.wants(b"news.eu"));
        assert!(!peer.wants(b"sport"));
    }

    #[tokio::test]
    async fn test_disconnect_releases_delivered_subscriptions() {
        let (mut client, server) = connected_pair().await;
        let table: PeerTable = Arc::new(RwLock::new(PeerState::default()));
        let (inbound_tx, mut inbound_rx) = mpsc::channel(4);
        let ctx = subscriber_peer(&table, inbound_tx).await;

        let (_out_tx, out_rx) = mpsc::channel(1);
        let task = tokio::spawn(ctx.run(server, out_rx, Vec::new()));

        let subscribe = ControlFrame::subscribe("x").to_message();
        write_message(&mut client, &subscribe).await.unwrap();
        write_message(&mut client, &subscribe).await.unwrap();
        for _ in 0..2 {
            assert_eq!(inbound_rx.recv().await.unwrap().unwrap(), subscribe);
        }
        assert_eq!(table.read().await.peers[&1].filters[&Filter::new("x")], 2);

        drop(client);

        let unsubscribe = ControlFrame::unsubscribe("x").to_message();
        for _ in 0..2 {
            assert_eq!(inbound_rx.recv().await.unwrap().unwrap(), unsubscribe);
        }
        task.await.unwrap();
        assert!(table.read().await.peers.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_control_passes_through_untracked() {
        let (mut client, server) = connected_pair().await;
        let table: PeerTable = Arc::new(RwLock::new(PeerState::default()));
        let (inbound_tx, mut inbound_rx) = mpsc::channel(4);
        let ctx = subscriber_peer(&table, inbound_tx).await;

        let (_out_tx, out_rx) = mpsc::channel(1);
        let task = tokio::spawn(ctx.run(server, out_rx, Vec::new()));

        let malformed = Message::single(&b"\x02bad"[..]);
        write_message(&mut client, &malformed).await.unwrap();
        assert_eq!(inbound_rx.recv().await.unwrap().unwrap(), malformed);
        assert!(table.read().await.peers[&1].filters.is_empty());

        // Nothing was tracked, so nothing is released on disconnect
        drop(client);
        task.await.unwrap();
        assert!(inbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_stuck_behind_full_queue_is_not_released() {
        let (mut client, server) = connected_pair().await;
        let table: PeerTable = Arc::new(RwLock::new(PeerState::default()));
        let (inbound_tx, mut inbound_rx) = mpsc::channel(1);
        inbound_tx
            .send(Ok(Message::single("filler")))
            .await
            .unwrap();
        let ctx = subscriber_peer(&table, inbound_tx).await;

        let (out_tx, out_rx) = mpsc::channel(1);
        let task = tokio::spawn(ctx.run(server, out_rx, Vec::new()));

        write_message(&mut client, &ControlFrame::subscribe("x").to_message())
            .await
            .unwrap();

        // Reader is now waiting for room in the inbound queue
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(table.read().await.peers[&1].filters.is_empty());

        // Write side ends while the subscribe is still pending
        drop(out_tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("peer task did not finish")
            .unwrap();

        // The relay never saw the subscribe, so it must not see an unsubscribe
        assert!(table.read().await.peers.is_empty());
        assert_eq!(
            inbound_rx.recv().await.unwrap().unwrap(),
            Message::single("filler")
        );
        assert!(inbound_rx.try_recv().is_err());
    }
}
