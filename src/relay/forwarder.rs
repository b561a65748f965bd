//! Relay control loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::protocol::Message;
use crate::registry::{ControlFrame, ControlKind, SubscriptionRegistry};
use crate::stats::{RelayStats, StatsSnapshot};

use super::endpoint::{Endpoint, EndpointRole};

/// Lifecycle state of a relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Relay loop has not returned yet
    Running,
    /// Relay loop returned, after shutdown or an endpoint failure
    Stopped,
}

/// State shared between the relay and its handles
#[derive(Debug)]
struct Shared {
    shutdown_tx: watch::Sender<bool>,
    stopped: AtomicBool,
    stats: RelayStats,
}

/// Cloneable handle for stopping a relay and reading its statistics
#[derive(Debug, Clone)]
pub struct RelayHandle {
    shared: Arc<Shared>,
}

impl RelayHandle {
    /// Ask the relay to stop
    ///
    /// The relay finishes the frame it is currently forwarding (including
    /// waiting on a full destination) and then returns `Ok(())` from `run`.
    /// Safe to call from any task, any number of times.
    pub fn shutdown(&self) {
        self.shared.shutdown_tx.send_replace(true);
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        *self.shared.shutdown_tx.borrow()
    }

    /// Current lifecycle state
    pub fn state(&self) -> RelayState {
        if self.shared.stopped.load(Ordering::Acquire) {
            RelayState::Stopped
        } else {
            RelayState::Running
        }
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

/// What the loop woke up for
enum Inbound {
    Subscription(Result<Option<Message>>),
    Publication(Result<Option<Message>>),
}

/// Forwarding relay between a publisher-facing and a subscriber-facing endpoint
///
/// # Example
/// ```no_run
/// use xproxy::{ChannelEndpoint, Relay};
///
/// # async fn example() -> xproxy::Result<()> {
/// let (pub_facing, _publishers) = ChannelEndpoint::pair(64);
/// let (sub_facing, _subscribers) = ChannelEndpoint::pair(64);
///
/// let relay = Relay::new(pub_facing, sub_facing);
/// let handle = relay.handle();
/// let task = tokio::spawn(relay.run());
///
/// handle.shutdown();
/// task.await.expect("relay task panicked")?;
/// # Ok(())
/// # }
/// ```
pub struct Relay<P, S> {
    pub_facing: P,
    sub_facing: S,
    registry: SubscriptionRegistry,
    shared: Arc<Shared>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<P: Endpoint, S: Endpoint> Relay<P, S> {
    /// Create a relay over two endpoints
    pub fn new(pub_facing: P, sub_facing: S) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            pub_facing,
            sub_facing,
            registry: SubscriptionRegistry::new(),
            shared: Arc::new(Shared {
                shutdown_tx,
                stopped: AtomicBool::new(false),
                stats: RelayStats::new(),
            }),
            shutdown_rx,
        }
    }

    /// Get a handle for shutdown and statistics
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current subscription state
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Run the relay until shutdown or an endpoint failure
    ///
    /// Returns `Ok(())` after [`RelayHandle::shutdown`], or the error of the
    /// endpoint that became unusable.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Relay running");

        let result = self.pump().await;
        self.shared.stopped.store(true, Ordering::Release);

        let stats = self.shared.stats.snapshot();
        match &result {
            Ok(()) => tracing::info!(
                forwarded = stats.data_forwarded,
                discarded = stats.data_discarded,
                subscribes = stats.subscribes,
                unsubscribes = stats.unsubscribes,
                filters = self.registry.len(),
                "Relay stopped"
            ),
            Err(e) => tracing::error!(
                error = %e,
                forwarded = stats.data_forwarded,
                discarded = stats.data_discarded,
                "Relay stopped on endpoint failure"
            ),
        }

        result
    }

    async fn pump(&mut self) -> Result<()> {
        loop {
            let stop = *self.shutdown_rx.borrow_and_update();
            if stop {
                tracing::debug!("Shutdown requested");
                return Ok(());
            }

            let inbound = tokio::select! {
                _ = self.shutdown_rx.changed() => continue,
                res = self.sub_facing.recv() => Inbound::Subscription(res),
                res = self.pub_facing.recv() => Inbound::Publication(res),
            };

            match inbound {
                Inbound::Subscription(res) => {
                    let msg = res?.ok_or(Error::EndpointClosed(EndpointRole::SubscriberFacing))?;
                    self.handle_control(msg).await?;
                }
                Inbound::Publication(res) => {
                    let msg = res?.ok_or(Error::EndpointClosed(EndpointRole::PublisherFacing))?;
                    self.handle_data(msg).await?;
                }
            }
        }
    }

    /// Apply a subscriber-facing frame and relay it upstream unchanged
    async fn handle_control(&mut self, msg: Message) -> Result<()> {
        let frame = match ControlFrame::from_message(&msg) {
            Ok(frame) => frame,
            Err(e) => {
                self.shared.stats.record_malformed();
                tracing::warn!(error = %e, "Dropping malformed control frame");
                return Ok(());
            }
        };

        let outcome = self.registry.apply_control(&frame);
        match frame.kind {
            ControlKind::Subscribe => self.shared.stats.record_subscribe(self.registry.len()),
            ControlKind::Unsubscribe => {
                self.shared.stats.record_unsubscribe(self.registry.len())
            }
        }

        tracing::debug!(
            kind = ?frame.kind,
            filter = %frame.filter,
            outcome = ?outcome,
            filters = self.registry.len(),
            "Control frame applied"
        );

        self.pub_facing.send(msg).await
    }

    /// Forward a publisher-facing frame if any filter matches its topic
    async fn handle_data(&mut self, msg: Message) -> Result<()> {
        let Some(topic) = msg.topic() else {
            self.shared.stats.record_discarded();
            tracing::warn!("Dropping data frame with no parts");
            return Ok(());
        };

        if !self.registry.matches(topic) {
            self.shared.stats.record_discarded();
            tracing::debug!(topic = %topic.escape_ascii(), "No subscriber for topic");
            return Ok(());
        }

        let size = msg.payload_size();
        self.sub_facing.send(msg).await?;
        self.shared.stats.record_forwarded(size);
        Ok(())
    }
}
