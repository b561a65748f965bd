//! TCP socket endpoint
//!
//! Binds a listener, accepts any number of peers and presents them to the
//! relay as one [`Endpoint`].
//!
//! Inbound frames from all peers are merged into one bounded queue. Outbound
//! frames are copied into per-peer queues:
//!
//! - subscriber-facing: only peers holding a matching filter get a copy
//! - publisher-facing: every peer gets a copy, and a newly connected peer is
//!   first sent the subscriptions that are already live

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{is_connection_error, is_resource_exhaustion, Error, Result};
use crate::protocol::Message;
use crate::registry::ControlFrame;
use crate::relay::{Endpoint, EndpointRole};
use crate::server::config::ProxyConfig;
use crate::server::peer::{PeerContext, PeerEntry, PeerState, PeerTable};

/// Pause before accepting again after running out of descriptors or buffers
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How the accept loop treats a failed `accept`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptError {
    /// The incoming connection failed; keep accepting
    Connection,
    /// A resource limit was hit; wait, then keep accepting
    ResourceExhausted,
    /// The listener cannot be used any more
    Fatal,
}

fn classify_accept_error(e: &io::Error) -> AcceptError {
    if is_connection_error(e) {
        AcceptError::Connection
    } else if is_resource_exhaustion(e) {
        AcceptError::ResourceExhausted
    } else {
        AcceptError::Fatal
    }
}

/// A listening TCP endpoint serving many peers
pub struct SocketEndpoint {
    role: EndpointRole,
    local_addr: SocketAddr,
    inbound_rx: mpsc::Receiver<Result<Message>>,
    table: PeerTable,
    accept_task: JoinHandle<()>,
}

impl SocketEndpoint {
    /// Bind `addr` and start accepting peers
    pub async fn bind(role: EndpointRole, addr: SocketAddr, config: &ProxyConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, role = %role, "Endpoint listening");

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let table: PeerTable = Arc::new(RwLock::new(PeerState::default()));

        let acceptor = Acceptor {
            role,
            config: config.clone(),
            table: Arc::clone(&table),
            inbound: inbound_tx,
            next_session_id: AtomicU64::new(1),
            connection_semaphore: (config.max_connections > 0)
                .then(|| Arc::new(Semaphore::new(config.max_connections))),
        };
        let accept_task = tokio::spawn(acceptor.run(listener));

        Ok(Self {
            role,
            local_addr,
            inbound_rx,
            table,
            accept_task,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connected peers
    pub async fn peer_count(&self) -> usize {
        self.table.read().await.peers.len()
    }

    /// Collect the outbound queues a message should be copied to
    async fn targets(&self, msg: &Message) -> Vec<(u64, mpsc::Sender<Message>)> {
        match self.role {
            EndpointRole::SubscriberFacing => {
                let Some(topic) = msg.topic() else {
                    return Vec::new();
                };
                let state = self.table.read().await;
                state
                    .peers
                    .iter()
                    .filter(|(_, peer)| peer.wants(topic))
                    .map(|(id, peer)| (*id, peer.tx.clone()))
                    .collect()
            }
            EndpointRole::PublisherFacing => {
                // Tracking and snapshot under one lock, so a peer that joins
                // concurrently sees this frame either in its replay or in its
                // queue, never both and never neither.
                let mut state = self.table.write().await;
                if let Ok(frame) = ControlFrame::from_message(msg) {
                    state.track_upstream(&frame);
                }
                state
                    .peers
                    .iter()
                    .map(|(id, peer)| (*id, peer.tx.clone()))
                    .collect()
            }
        }
    }
}

impl Endpoint for SocketEndpoint {
    async fn recv(&mut self) -> Result<Option<Message>> {
        match self.inbound_rx.recv().await {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn send(&mut self, msg: Message) -> Result<()> {
        let targets = self.targets(&msg).await;

        for (session_id, tx) in targets {
            // Waits while the peer's queue is at its high-water mark
            if tx.send(msg.clone()).await.is_err() {
                tracing::debug!(session_id = session_id, "Peer gone, skipping");
            }
        }

        Ok(())
    }
}

impl Drop for SocketEndpoint {
    fn drop(&mut self) {
        // Dropping the accept loop drops its JoinSet, which aborts every peer task
        self.accept_task.abort();
    }
}

/// Accept loop state
struct Acceptor {
    role: EndpointRole,
    config: ProxyConfig,
    table: PeerTable,
    inbound: mpsc::Sender<Result<Message>>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Acceptor {
    async fn run(self, listener: TcpListener) {
        let mut peers = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(&mut peers, socket, peer_addr).await;
                    }
                    Err(e) => {
                        if self.on_accept_error(e).await.is_break() {
                            return;
                        }
                    }
                },
                Some(_) = peers.join_next() => {}
            }
        }
    }

    /// React to a failed `accept`
    ///
    /// Breaks only when the listener itself is unusable; the error is then
    /// handed to the relay through the inbound queue.
    async fn on_accept_error(&self, e: io::Error) -> ControlFlow<()> {
        match classify_accept_error(&e) {
            AcceptError::Connection => {
                tracing::warn!(error = %e, role = %self.role, "Failed to accept connection");
                ControlFlow::Continue(())
            }
            AcceptError::ResourceExhausted => {
                tracing::warn!(
                    error = %e,
                    role = %self.role,
                    backoff_ms = ACCEPT_BACKOFF.as_millis() as u64,
                    "Out of resources accepting connection, backing off"
                );
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                ControlFlow::Continue(())
            }
            AcceptError::Fatal => {
                tracing::error!(error = %e, role = %self.role, "Listener failed");
                let _ = self.inbound.send(Err(Error::Io(e))).await;
                ControlFlow::Break(())
            }
        }
    }

    async fn handle_connection(
        &self,
        peers: &mut JoinSet<()>,
        socket: TcpStream,
        peer_addr: SocketAddr,
    ) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, role = %self.role, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.high_water_mark);

        let replay = {
            let mut state = self.table.write().await;
            let replay = match self.role {
                EndpointRole::PublisherFacing => state.upstream_replay(),
                EndpointRole::SubscriberFacing => Vec::new(),
            };
            state.peers.insert(
                session_id,
                PeerEntry {
                    tx,
                    filters: HashMap::new(),
                },
            );
            replay
        };

        tracing::info!(
            session_id = session_id,
            peer = %peer_addr,
            role = %self.role,
            replayed = replay.len(),
            "Peer connected"
        );

        let ctx = PeerContext {
            id: session_id,
            addr: peer_addr,
            role: self.role,
            table: Arc::clone(&self.table),
            inbound: self.inbound.clone(),
            max_message_size: self.config.max_message_size,
        };

        peers.spawn(async move {
            let _permit = permit;
            ctx.run(socket, rx, replay).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::client::Subscriber;
    use crate::relay::{ChannelEndpoint, Relay, RelayState};

    /// Endpoint whose inbound queue is fed by a caller-held acceptor
    fn detached(role: EndpointRole) -> (SocketEndpoint, Acceptor) {
        let (inbound_tx, inbound_rx) = mpsc::channel(4);
        let table: PeerTable = Arc::new(RwLock::new(PeerState::default()));

        let acceptor = Acceptor {
            role,
            config: ProxyConfig::localhost(),
            table: Arc::clone(&table),
            inbound: inbound_tx,
            next_session_id: AtomicU64::new(1),
            connection_semaphore: None,
        };
        let endpoint = SocketEndpoint {
            role,
            local_addr: "127.0.0.1:0".parse().unwrap(),
            inbound_rx,
            table,
            accept_task: tokio::spawn(async {}),
        };

        (endpoint, acceptor)
    }

    #[test]
    fn test_classify_accept_error() {
        for kind in [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Interrupted,
        ] {
            assert_eq!(
                classify_accept_error(&io::Error::from(kind)),
                AcceptError::Connection
            );
        }

        assert_eq!(
            classify_accept_error(&io::Error::from(io::ErrorKind::OutOfMemory)),
            AcceptError::ResourceExhausted
        );
        assert_eq!(
            classify_accept_error(&io::Error::from(io::ErrorKind::PermissionDenied)),
            AcceptError::Fatal
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_descriptor_exhaustion() {
        for code in [libc::EMFILE, libc::ENFILE, libc::ENOBUFS, libc::ENOMEM] {
            assert_eq!(
                classify_accept_error(&io::Error::from_raw_os_error(code)),
                AcceptError::ResourceExhausted
            );
        }
        assert_eq!(
            classify_accept_error(&io::Error::from_raw_os_error(libc::EBADF)),
            AcceptError::Fatal
        );
    }

    #[tokio::test]
    async fn test_resource_exhaustion_backs_off_and_keeps_accepting() {
        let (mut endpoint, acceptor) = detached(EndpointRole::SubscriberFacing);

        let started = Instant::now();
        let flow = acceptor
            .on_accept_error(io::Error::from(io::ErrorKind::OutOfMemory))
            .await;

        assert!(flow.is_continue());
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
        assert!(endpoint.inbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connection_error_keeps_accepting() {
        let (mut endpoint, acceptor) = detached(EndpointRole::PublisherFacing);

        let flow = acceptor
            .on_accept_error(io::Error::from(io::ErrorKind::ConnectionAborted))
            .await;

        assert!(flow.is_continue());
        assert!(endpoint.inbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fatal_listener_error_stops_relay() {
        let (endpoint, acceptor) = detached(EndpointRole::PublisherFacing);
        let (sub_facing, _subscribers) = ChannelEndpoint::pair(4);

        let relay = Relay::new(endpoint, sub_facing);
        let handle = relay.handle();
        let task = tokio::spawn(relay.run());

        let flow = acceptor
            .on_accept_error(io::Error::from(io::ErrorKind::PermissionDenied))
            .await;
        assert!(flow.is_break());

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(Error::Io(ref e)) if e.kind() == io::ErrorKind::PermissionDenied
        ));
        assert_eq!(handle.state(), RelayState::Stopped);
    }

    #[tokio::test]
    async fn test_peer_count_follows_connections() {
        let config = ProxyConfig::localhost();
        let endpoint =
            SocketEndpoint::bind(EndpointRole::SubscriberFacing, config.backend_addr, &config)
                .await
                .unwrap();

        let wait_for_count = |expected: usize| {
            let endpoint = &endpoint;
            async move {
                for _ in 0..200 {
                    if endpoint.peer_count().await == expected {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                panic!("peer count never reached {}", expected);
            }
        };

        assert_eq!(endpoint.peer_count().await, 0);

        let first = Subscriber::connect(endpoint.local_addr()).await.unwrap();
        let second = Subscriber::connect(endpoint.local_addr()).await.unwrap();
        wait_for_count(2).await;

        drop(first);
        wait_for_count(1).await;
        drop(second);
        wait_for_count(0).await;
    }
}
