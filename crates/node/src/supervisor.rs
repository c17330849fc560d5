use std::net::SocketAddr;
use std::sync::Arc;

use cluster_config::ClusterConfig;
use collab::{EditingServer, Gateway, MessageBrokerClient, MessageBrokerServer, Storage};
use events::{Event, Publisher, Topic};
use membership::MembershipTable;
use primitives::NodeAddress;
use telemetry::{error, info, warn};
use timers::{SingleTimer, TimerRegistry};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::election::ElectionState;
use crate::error::{NodeError, Result};

/// Events fed back into the single dispatch context by the timer
/// machinery (spec §4.3, §5: "timer bodies never mutate shared state
/// directly").
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DispatchEvent {
    JoinTick,
    HelloTick(NodeAddress),
    HelloTimeout(NodeAddress),
    ElectionTick(NodeAddress),
    ElectionTimeout(NodeAddress),
    CoordinatorTick(NodeAddress),
    CoordinatorTimeout(NodeAddress),
    PreElectionTimeout,
    AwaitCoordinatorTimeout,
}

/// Pluggable external collaborators the Role Controller starts and stops
/// (spec §6). Tests and the demo binary wire in the `collab::Noop*` stubs;
/// a real deployment supplies its own broker/gateway/editing/storage
/// implementations.
pub struct Collaborators {
    pub broker_server: Arc<dyn MessageBrokerServer>,
    pub broker_client: Arc<dyn MessageBrokerClient>,
    pub gateway: Arc<dyn Gateway>,
    pub editing_server: Arc<dyn EditingServer>,
    pub storage: Arc<dyn Storage>,
}

/// Owns the UDP socket and every piece of mutable core state. Single
/// writer, single dispatch context (spec §5) — nothing outside `run`
/// mutates `membership`, `election`, or the timer registries.
pub struct Supervisor {
    pub(crate) config: ClusterConfig,
    pub(crate) socket: UdpSocket,
    pub(crate) membership: MembershipTable,
    pub(crate) election: ElectionState,
    pub(crate) local_roles: std::collections::HashSet<primitives::Role>,

    pub(crate) join_timer: SingleTimer<DispatchEvent>,
    pub(crate) pre_election_timer: SingleTimer<DispatchEvent>,
    pub(crate) await_coordinator_timer: SingleTimer<DispatchEvent>,
    pub(crate) hello_intervals: TimerRegistry<NodeAddress, DispatchEvent>,
    pub(crate) hello_timeouts: TimerRegistry<NodeAddress, DispatchEvent>,
    pub(crate) election_intervals: TimerRegistry<NodeAddress, DispatchEvent>,
    pub(crate) election_timeouts: TimerRegistry<NodeAddress, DispatchEvent>,
    pub(crate) coordinator_intervals: TimerRegistry<NodeAddress, DispatchEvent>,
    pub(crate) coordinator_timeouts: TimerRegistry<NodeAddress, DispatchEvent>,

    pub(crate) dispatch_tx: UnboundedSender<DispatchEvent>,
    dispatch_rx: UnboundedReceiver<DispatchEvent>,

    pub(crate) events_tx: Publisher,
    pub(crate) collaborators: Collaborators,

    shutdown_rx: Option<UnboundedReceiver<()>>,
}

pub struct SupervisorHandle {
    pub shutdown_tx: UnboundedSender<()>,
    pub local_addr: SocketAddr,
}

impl Supervisor {
    /// Binds the discovery socket and builds all timer registries. Does
    /// not start the dispatch loop — call `run` for that.
    pub async fn bind(
        config: ClusterConfig,
        events_tx: Publisher,
        collaborators: Collaborators,
    ) -> Result<(Self, SupervisorHandle)> {
        let bind_addr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), config.discovery_port);

        let socket = UdpSocket::bind(bind_addr).await.map_err(NodeError::BindFailure)?;
        socket.set_broadcast(true).map_err(NodeError::BindFailure)?;
        let local_addr = socket.local_addr().map_err(NodeError::BindFailure)?;

        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();

        let self_address = config.local_address;
        let netmask = config.netmask;

        let supervisor = Self {
            membership: MembershipTable::new(self_address, netmask),
            election: ElectionState::Idle,
            local_roles: std::collections::HashSet::new(),
            join_timer: SingleTimer::new(dispatch_tx.clone()),
            pre_election_timer: SingleTimer::new(dispatch_tx.clone()),
            await_coordinator_timer: SingleTimer::new(dispatch_tx.clone()),
            hello_intervals: TimerRegistry::new(dispatch_tx.clone()),
            hello_timeouts: TimerRegistry::new(dispatch_tx.clone()),
            election_intervals: TimerRegistry::new(dispatch_tx.clone()),
            election_timeouts: TimerRegistry::new(dispatch_tx.clone()),
            coordinator_intervals: TimerRegistry::new(dispatch_tx.clone()),
            coordinator_timeouts: TimerRegistry::new(dispatch_tx.clone()),
            dispatch_tx,
            dispatch_rx,
            events_tx,
            collaborators,
            config,
            socket,
            shutdown_rx: Some(shutdown_rx),
        };

        Ok((supervisor, SupervisorHandle { shutdown_tx, local_addr }))
    }

    /// The single dispatch loop: `tokio::select!`s over inbound
    /// datagrams, timer-fed dispatch events, and shutdown — the systems-
    /// language realization of the cooperative single-threaded core (spec
    /// §5). Mirrors the teacher's `BroadcastEngineController::listen`.
    pub async fn run(mut self) {
        self.start_join_loop();

        let mut shutdown_rx = self.shutdown_rx.take().expect("run called once");
        let mut buf = [0u8; 65536];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, from)) => {
                            let from_addr = match from.ip() {
                                std::net::IpAddr::V4(v4) => v4,
                                std::net::IpAddr::V6(_) => {
                                    warn!("ignoring datagram from non-IPv4 peer {from}");
                                    continue;
                                },
                            };

                            if from_addr == self.config.local_address {
                                continue;
                            }

                            self.dispatch_datagram(from_addr, &buf[..len]).await;
                        },
                        Err(err) => error!("error reading from discovery socket: {err}"),
                    }
                },
                Some(event) = self.dispatch_rx.recv() => {
                    self.dispatch_timer_event(event).await;
                },
                Some(()) = shutdown_rx.recv() => {
                    info!("supervisor received shutdown signal");
                    break;
                },
            }
        }

        self.shutdown().await;
    }

    async fn dispatch_datagram(&mut self, from: NodeAddress, raw: &[u8]) {
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(err) => {
                error!("datagram from {from} was not valid utf-8: {err}");
                return;
            },
        };

        match wire::Message::parse(text) {
            Ok(message) => self.handle_message(from, message).await,
            Err(source) => error!("{}", NodeError::MalformedDatagram { from, source }),
        }
    }

    async fn handle_message(&mut self, from: NodeAddress, message: wire::Message) {
        use wire::Message;

        match message {
            Message::Join => self.on_join(from).await,
            Message::Hello(nodes) => self.on_hello(from, nodes).await,
            Message::AckHello(nodes) => self.on_ack_hello(from, nodes).await,
            Message::Election => self.on_election(from).await,
            Message::Ok => self.on_ok(from).await,
            Message::Coordinator(nodes) => self.on_coordinator(from, nodes).await,
            Message::AckCoordinator(nodes) => self.on_ack_coordinator(from, nodes).await,
        }
    }

    async fn dispatch_timer_event(&mut self, event: DispatchEvent) {
        match event {
            DispatchEvent::JoinTick => self.send_join().await,
            DispatchEvent::HelloTick(peer) => self.send_hello(peer).await,
            DispatchEvent::HelloTimeout(peer) => self.on_hello_timeout(peer).await,
            DispatchEvent::ElectionTick(peer) => self.send_election(peer).await,
            DispatchEvent::ElectionTimeout(peer) => self.on_election_timeout(peer).await,
            DispatchEvent::CoordinatorTick(peer) => self.send_coordinator(peer).await,
            DispatchEvent::CoordinatorTimeout(peer) => self.on_coordinator_timeout(peer),
            DispatchEvent::PreElectionTimeout => self.start_election().await,
            DispatchEvent::AwaitCoordinatorTimeout => self.on_await_coordinator_timeout().await,
        }
    }

    async fn shutdown(mut self) {
        self.join_timer.cancel();
        self.pre_election_timer.cancel();
        self.await_coordinator_timer.cancel();
        self.hello_intervals.cancel_all();
        self.hello_timeouts.cancel_all();
        self.election_intervals.cancel_all();
        self.election_timeouts.cancel_all();
        self.coordinator_intervals.cancel_all();
        self.coordinator_timeouts.cancel_all();

        let _ = self.events_tx.send((Topic::Control, Event::Stop));

        info!("supervisor shut down, socket closed and all timers cancelled");
    }

    pub(crate) fn peer_addr(&self, peer: NodeAddress) -> SocketAddr {
        SocketAddr::new(std::net::IpAddr::V4(peer), self.config.discovery_port)
    }

    pub(crate) fn broadcast_addr(&self) -> SocketAddr {
        SocketAddr::new(std::net::IpAddr::V4(self.config.broadcast_address()), self.config.discovery_port)
    }

    pub(crate) async fn unicast(&self, peer: NodeAddress, message: &wire::Message) {
        let encoded = message.encode();
        let addr = self.peer_addr(peer);

        if let Err(source) = self.socket.send_to(encoded.as_bytes(), addr).await {
            error!("{}", NodeError::SendFailure { to: peer, source });
        }
    }

    pub(crate) async fn broadcast(&self, message: &wire::Message) {
        let encoded = message.encode();
        let addr = self.broadcast_addr();

        if let Err(source) = self.socket.send_to(encoded.as_bytes(), addr).await {
            error!("{}", NodeError::SendFailure { to: self.config.broadcast_address(), source });
        }
    }

    pub(crate) fn node_list_payload(&self) -> Vec<wire::NodeDescriptor> {
        self.membership
            .snapshot()
            .into_iter()
            .map(|entry| wire::NodeDescriptor {
                address: entry.address,
                roles: entry.roles,
            })
            .collect()
    }

    pub(crate) fn emit_nodes_changed(&self) {
        let snapshot = self.membership.snapshot();
        let _ = self.events_tx.send((Topic::Nodes, Event::NodesChanged(snapshot)));
    }
}
