//! Node actor.
//!
//! One task owns one [`TrustNode`]. Routing-layer requests arrive through a
//! [`NodeHandle`], advertisements through the transport's inbound queue, and
//! the periodic broadcast from a timer. The loop handles one event at a time,
//! so the node's tables are never shared.

use std::net::Ipv4Addr;
use std::time::Duration;

use futures::future::join_all;
use mesh_trust::{ForwardVerdict, NodeReport, RecordOutcome, RepAction, TrustNode};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::transport::{Envelope, Transport};

/// Requests a [`NodeHandle`] sends to its actor.
#[derive(Debug)]
enum Command {
    Decide {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        reply: oneshot::Sender<RepAction>,
    },
    CheckAdmission {
        neighbor: Ipv4Addr,
        reply: oneshot::Sender<bool>,
    },
    Record {
        neighbor: Ipv4Addr,
        pkt_id: u64,
        reply: oneshot::Sender<RecordOutcome>,
    },
    Acknowledge {
        neighbor: Ipv4Addr,
        pkt_id: u64,
        reply: oneshot::Sender<bool>,
    },
    Forward {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        next_hop: Ipv4Addr,
        pkt_id: u64,
        reply: oneshot::Sender<ForwardVerdict>,
    },
    Broadcast {
        reply: oneshot::Sender<usize>,
    },
    ForgetNeighbor {
        neighbor: Ipv4Addr,
        reply: oneshot::Sender<()>,
    },
    ShouldDepart {
        reply: oneshot::Sender<bool>,
    },
    Report {
        reply: oneshot::Sender<NodeReport>,
    },
}

/// Cloneable handle for talking to a running node.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    address: Ipv4Addr,
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
}

impl NodeHandle {
    /// Address of the node.
    #[must_use]
    pub const fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Decide the action for relayed traffic from `src` to `dst`.
    pub async fn decide(&self, src: Ipv4Addr, dst: Ipv4Addr) -> NodeResult<RepAction> {
        self.request(|reply| Command::Decide { src, dst, reply }).await
    }

    /// Run the admission filter for the next packet through `neighbor`.
    pub async fn check_and_advance(&self, neighbor: Ipv4Addr) -> NodeResult<bool> {
        self.request(|reply| Command::CheckAdmission { neighbor, reply })
            .await
    }

    /// Record a packet forwarded through `neighbor`.
    pub async fn record(&self, neighbor: Ipv4Addr, pkt_id: u64) -> NodeResult<RecordOutcome> {
        self.request(|reply| Command::Record {
            neighbor,
            pkt_id,
            reply,
        })
        .await
    }

    /// Mark a packet forwarded through `neighbor` as delivered.
    pub async fn acknowledge(&self, neighbor: Ipv4Addr, pkt_id: u64) -> NodeResult<bool> {
        self.request(|reply| Command::Acknowledge {
            neighbor,
            pkt_id,
            reply,
        })
        .await
    }

    /// Run a packet through the full forwarding pipeline.
    pub async fn forward(
        &self,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        next_hop: Ipv4Addr,
        pkt_id: u64,
    ) -> NodeResult<ForwardVerdict> {
        self.request(|reply| Command::Forward {
            src,
            dst,
            next_hop,
            pkt_id,
            reply,
        })
        .await
    }

    /// Broadcast the reputation table now. Returns how many neighbors it
    /// reached.
    pub async fn broadcast(&self) -> NodeResult<usize> {
        self.request(|reply| Command::Broadcast { reply }).await
    }

    /// Drop every table entry for a departed neighbor.
    pub async fn forget_neighbor(&self, neighbor: Ipv4Addr) -> NodeResult<()> {
        self.request(|reply| Command::ForgetNeighbor { neighbor, reply })
            .await
    }

    /// Whether the node's gate history says it should leave.
    pub async fn should_depart(&self) -> NodeResult<bool> {
        self.request(|reply| Command::ShouldDepart { reply }).await
    }

    /// Telemetry snapshot.
    pub async fn report(&self) -> NodeResult<NodeReport> {
        self.request(|reply| Command::Report { reply }).await
    }

    /// Stop the actor. Pending and future requests fail with
    /// `NodeError::ActorStopped`.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether the actor has been asked to stop.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> NodeResult<R> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| NodeError::ActorStopped)?;
        rx.await.map_err(|_| NodeError::ActorStopped)
    }
}

/// Event loop owning a [`TrustNode`] and its transport.
#[derive(Debug)]
pub struct NodeActor<T> {
    node: TrustNode,
    transport: T,
    inbound: mpsc::Receiver<Envelope>,
    commands: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
    broadcast_interval: Duration,
}

impl<T: Transport + 'static> NodeActor<T> {
    /// Build an actor and the handle that drives it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        transport: T,
        inbound: mpsc::Receiver<Envelope>,
        config: &NodeConfig,
    ) -> NodeResult<(Self, NodeHandle)> {
        config.validate()?;
        let address = transport.local_addr();
        let node = TrustNode::new(address, config.trust.clone())?;

        let (tx, rx) = mpsc::channel(config.mailbox_capacity);
        let shutdown = CancellationToken::new();
        let handle = NodeHandle {
            address,
            commands: tx,
            shutdown: shutdown.clone(),
        };
        let actor = Self {
            node,
            transport,
            inbound,
            commands: rx,
            shutdown,
            broadcast_interval: config.broadcast_interval,
        };
        Ok((actor, handle))
    }

    /// Run the actor on a new task. The task yields the node when it stops.
    pub fn spawn(self) -> JoinHandle<TrustNode> {
        tokio::spawn(self.run())
    }

    /// Run until shut down or every handle is dropped. Returns the node.
    pub async fn run(mut self) -> TrustNode {
        let period = self.broadcast_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inbound_open = true;

        info!(
            node = %self.node.address(),
            interval_ms = period.as_millis() as u64,
            "Node actor started"
        );

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!(node = %self.node.address(), "Shutdown requested");
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!(node = %self.node.address(), "All handles dropped");
                        break;
                    };
                    self.handle_command(command).await;
                }
                envelope = self.inbound.recv(), if inbound_open => {
                    match envelope {
                        Some(envelope) => self.handle_envelope(&envelope),
                        None => {
                            warn!(node = %self.node.address(), "Inbound queue closed");
                            inbound_open = false;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.broadcast().await;
                }
            }
        }

        info!(node = %self.node.address(), "Node actor stopped");
        self.node
    }

    async fn handle_command(&mut self, command: Command) {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            Command::Decide { src, dst, reply } => {
                let _ = reply.send(self.node.decide(src, dst));
            }
            Command::CheckAdmission { neighbor, reply } => {
                let _ = reply.send(self.node.check_and_advance(neighbor));
            }
            Command::Record {
                neighbor,
                pkt_id,
                reply,
            } => {
                let _ = reply.send(self.node.record(neighbor, pkt_id));
            }
            Command::Acknowledge {
                neighbor,
                pkt_id,
                reply,
            } => {
                let _ = reply.send(self.node.acknowledge(neighbor, pkt_id));
            }
            Command::Forward {
                src,
                dst,
                next_hop,
                pkt_id,
                reply,
            } => {
                let _ = reply.send(self.node.forward(src, dst, next_hop, pkt_id));
            }
            Command::Broadcast { reply } => {
                let reached = self.broadcast().await;
                let _ = reply.send(reached);
            }
            Command::ForgetNeighbor { neighbor, reply } => {
                self.node.forget_neighbor(neighbor);
                let _ = reply.send(());
            }
            Command::ShouldDepart { reply } => {
                let _ = reply.send(self.node.should_depart());
            }
            Command::Report { reply } => {
                let _ = reply.send(self.node.report());
            }
        }
    }

    fn handle_envelope(&mut self, envelope: &Envelope) {
        // Malformed advertisements are logged and dropped by the node.
        if let Ok(report) = self
            .node
            .receive_advertisement(envelope.from, &envelope.payload)
        {
            debug!(
                node = %self.node.address(),
                from = %envelope.from,
                averaged = report.averaged,
                inserted = report.inserted,
                "Advertisement received"
            );
        }
    }

    async fn broadcast(&mut self) -> usize {
        let neighbors = self.transport.neighbors();
        if neighbors.is_empty() {
            debug!(node = %self.node.address(), "No neighbors, skipping broadcast");
            return 0;
        }

        let payload = self.node.advertisement();
        let transport = &self.transport;
        let sends = neighbors
            .iter()
            .map(|neighbor| transport.send_to(*neighbor, payload.clone()));
        let results = join_all(sends).await;

        let mut reached = 0;
        for (neighbor, result) in neighbors.iter().zip(results) {
            match result {
                Ok(()) => reached += 1,
                Err(e) => warn!(
                    node = %self.node.address(),
                    neighbor = %neighbor,
                    error = %e,
                    "Advertisement not delivered"
                ),
            }
        }
        debug!(
            node = %self.node.address(),
            reached,
            bytes = payload.len(),
            "Reputation broadcast"
        );
        reached
    }
}
