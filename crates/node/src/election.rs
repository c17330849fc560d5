//! Bully election engine (spec §4.6, C6).
use primitives::NodeAddress;
use telemetry::{info, warn};
use wire::{Message, NodeDescriptor};

use crate::error::NodeError;
use crate::supervisor::{DispatchEvent, Supervisor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ElectionState {
    Idle,
    Candidate { received_ok: bool },
    Leader,
}

impl Supervisor {
    /// Starts (or restarts) an election round (spec §4.6 steps 1-3).
    pub(crate) async fn start_election(&mut self) {
        let rank = self.membership.own_priority_rank();

        if rank.higher.is_empty() {
            info!("no higher-priority peer known, becoming LEADER");
            self.become_leader().await;
            return;
        }

        info!("starting election against {} higher-priority peer(s)", rank.higher.len());
        self.election = ElectionState::Candidate { received_ok: false };

        for peer in rank.higher {
            self.election_intervals.set_interval(
                peer.address,
                self.config.message_interval,
                DispatchEvent::ElectionTick(peer.address),
            );
            self.election_timeouts.set_timeout(
                peer.address,
                self.config.message_timeout,
                DispatchEvent::ElectionTimeout(peer.address),
            );
        }
    }

    pub(crate) async fn send_election(&self, peer: NodeAddress) {
        self.unicast(peer, &Message::Election).await;
    }

    /// ELECTION received from `from` (spec §4.6 steps 6-7).
    pub(crate) async fn on_election(&mut self, from: NodeAddress) {
        let self_priority = self.membership.self_priority();
        let from_priority = primitives::priority(from, self.config.netmask);

        if from_priority >= self_priority {
            warn!(
                "{}",
                NodeError::ProtocolViolation {
                    from,
                    reason: "ELECTION from a peer with priority >= ours".to_string(),
                }
            );
            return;
        }

        info!("received ELECTION from lower-priority peer {from}");
        self.pre_election_timer.cancel();
        self.unicast(from, &Message::Ok).await;

        if matches!(self.election, ElectionState::Idle) {
            self.pre_election_timer
                .set_timeout(self.config.preelection_timeout, DispatchEvent::PreElectionTimeout);
        }
    }

    /// OK received from `from` (spec §4.6 step 4).
    pub(crate) async fn on_ok(&mut self, from: NodeAddress) {
        info!("received OK from {from}");

        self.election = ElectionState::Candidate { received_ok: true };
        self.election_intervals.cancel_all();
        self.election_timeouts.cancel_all();

        self.await_coordinator_timer
            .set_timeout(self.config.message_timeout, DispatchEvent::AwaitCoordinatorTimeout);
    }

    /// No COORDINATOR arrived within a further `MESSAGE_TIMEOUT` after an
    /// OK was received (spec §4.6 step 4, §9 open question — resolved
    /// here as "restart election").
    pub(crate) async fn on_await_coordinator_timeout(&mut self) {
        warn!("received OK but no COORDINATOR followed, restarting election");
        self.start_election().await;
    }

    /// `electionTimeout[h]` firing (spec §4.6 step 5).
    pub(crate) async fn on_election_timeout(&mut self, peer: NodeAddress) {
        self.election_intervals.cancel(&peer);
        warn!("{}", NodeError::PeerUnresponsive(peer));
        self.membership.remove(peer);
        self.emit_nodes_changed();

        let received_ok = matches!(self.election, ElectionState::Candidate { received_ok: true });

        if !received_ok && self.election_intervals.is_empty() {
            info!("all higher-priority peers timed out, becoming LEADER");
            self.become_leader().await;
        }
    }

    /// COORDINATOR received (spec §4.6 steps 8-9; dispatches into the Role
    /// Controller for the payload-validation half of step 8, §4.7).
    pub(crate) async fn on_coordinator(&mut self, from: NodeAddress, nodes: Vec<NodeDescriptor>) {
        let self_priority = self.membership.self_priority();
        let from_priority = primitives::priority(from, self.config.netmask);

        if from_priority <= self_priority {
            warn!(
                "{}",
                NodeError::ProtocolViolation {
                    from,
                    reason: "COORDINATOR from a sender not higher priority than us".to_string(),
                }
            );
            return;
        }

        info!("accepted COORDINATOR from {from}");

        self.pre_election_timer.cancel();
        self.await_coordinator_timer.cancel();
        self.election_intervals.cancel_all();
        self.election_timeouts.cancel_all();
        self.election = ElectionState::Idle;

        self.apply_role_assignment(from, nodes.clone()).await;

        self.unicast(from, &Message::AckCoordinator(nodes)).await;
    }
}
