//! Role Controller & LEADER path (spec §4.7, C7).
use std::collections::HashSet;

use events::{Event, Topic};
use primitives::{NodeAddress, Role};
use telemetry::{info, warn};
use wire::{Message, NodeDescriptor};

use crate::election::ElectionState;
use crate::error::NodeError;
use crate::supervisor::{DispatchEvent, Supervisor};

impl Supervisor {
    /// Becomes LEADER: builds the role vector, persists it, emits `roles`,
    /// and starts re-sending COORDINATOR to every other member until each
    /// ACKs or `MESSAGE_TIMEOUT` elapses (spec §4.7 steps 1-4).
    pub(crate) async fn become_leader(&mut self) {
        self.election = ElectionState::Leader;

        let vector = self.build_role_vector();
        let self_addr = self.membership.self_address();
        self.persist_role_vector(self_addr, vector).await;

        let members: Vec<NodeAddress> = self
            .membership
            .snapshot()
            .into_iter()
            .map(|entry| entry.address)
            .filter(|addr| *addr != self_addr)
            .collect();

        for peer in members {
            self.coordinator_intervals.set_interval(
                peer,
                self.config.message_interval,
                DispatchEvent::CoordinatorTick(peer),
            );
            self.coordinator_timeouts.set_timeout(
                peer,
                self.config.message_timeout,
                DispatchEvent::CoordinatorTimeout(peer),
            );
        }
    }

    pub(crate) async fn send_coordinator(&self, peer: NodeAddress) {
        self.unicast(peer, &Message::Coordinator(self.node_list_payload())).await;
    }

    /// `coordinatorIntervals[m]`'s paired timeout firing just stops the
    /// re-send loop; the member is not evicted (unlike the election
    /// timeout path) because COORDINATOR delivery failing doesn't imply
    /// the peer is dead, only that it missed the announcement.
    pub(crate) fn on_coordinator_timeout(&mut self, peer: NodeAddress) {
        self.coordinator_intervals.cancel(&peer);
    }

    /// ACK COORDINATOR received: cancels the re-send loop for `from` early
    /// (spec §4.7 step 4).
    pub(crate) async fn on_ack_coordinator(&mut self, from: NodeAddress, _nodes: Vec<NodeDescriptor>) {
        info!("received ACK COORDINATOR from {from}");
        self.coordinator_intervals.cancel(&from);
        self.coordinator_timeouts.cancel(&from);
    }

    /// Follower path: a COORDINATOR was accepted by the election engine
    /// (spec §4.6 step 8); validate the payload against locally known
    /// priorities and overwrite the local role vector to match.
    pub(crate) async fn apply_role_assignment(&mut self, from: NodeAddress, nodes: Vec<NodeDescriptor>) {
        let broker = nodes.iter().find(|n| n.roles.contains(&Role::MessageBroker));

        match broker {
            Some(entry) if entry.address == from => {},
            Some(entry) => warn!(
                "COORDINATOR from {from} announces MESSAGE_BROKER={}, not the sender; accepting anyway",
                entry.address
            ),
            None => warn!("COORDINATOR from {from} announces no MESSAGE_BROKER"),
        }

        if let Some(gateway) = nodes.iter().find(|n| n.roles.contains(&Role::Gateway)) {
            let expected = self.membership.min_priority_member().address;

            if gateway.address != expected {
                warn!(
                    "COORDINATOR from {from} announces GATEWAY={}, locally expected {expected}; accepting anyway",
                    gateway.address
                );
            }
        }

        let vector: Vec<(NodeAddress, HashSet<Role>)> =
            nodes.into_iter().map(|n| (n.address, n.roles)).collect();

        self.persist_role_vector(from, vector).await;
    }

    /// Overwrites the membership table's role assignment and reconciles
    /// external collaborators. Idempotent on an unchanged local role set
    /// (spec §9: "does not restart collaborators" when nothing changed).
    async fn persist_role_vector(
        &mut self,
        source: NodeAddress,
        vector: impl IntoIterator<Item = (NodeAddress, HashSet<Role>)>,
    ) {
        let self_addr = self.membership.self_address();

        for (address, roles) in vector {
            self.membership.upsert(address, roles);
        }

        let new_local_roles = self
            .membership
            .get(self_addr)
            .map(|entry| entry.roles.clone())
            .unwrap_or_default();

        let changed = new_local_roles != self.local_roles;

        if changed {
            self.reconcile_collaborators(&new_local_roles).await;
            self.local_roles = new_local_roles;
        }

        let snapshot = self.membership.snapshot();
        let _ = self.events_tx.send((Topic::Roles, Event::RolesChanged { snapshot, source }));
        self.emit_nodes_changed();
    }

    /// Stops collaborators for roles no longer held, then starts
    /// collaborators for newly held roles. Stop always completes before
    /// the corresponding start begins (spec §4.7 "stop before start").
    async fn reconcile_collaborators(&self, new_roles: &HashSet<Role>) {
        if self.local_roles.contains(&Role::MessageBroker) && !new_roles.contains(&Role::MessageBroker) {
            if let Err(source) = self.collaborators.broker_server.stop().await {
                warn!("{}", NodeError::RoleTransitionFailure(source));
            }
        }

        if self.local_roles.contains(&Role::Gateway) && !new_roles.contains(&Role::Gateway) {
            if let Err(source) = self.collaborators.gateway.stop().await {
                warn!("{}", NodeError::RoleTransitionFailure(source));
            }
        }

        if new_roles.contains(&Role::MessageBroker) && !self.local_roles.contains(&Role::MessageBroker) {
            if let Err(source) = self.collaborators.broker_server.start().await {
                warn!("{}", NodeError::RoleTransitionFailure(source));
            }
        }

        if new_roles.contains(&Role::Gateway) && !self.local_roles.contains(&Role::Gateway) {
            if let Err(source) = self.collaborators.gateway.start().await {
                warn!("{}", NodeError::RoleTransitionFailure(source));
            }
        }
    }

    /// Builds the role vector for a freshly elected LEADER (spec §4.7
    /// step 1): self holds `MESSAGE_BROKER`, the smallest-priority member
    /// *other than self* holds `GATEWAY`, everyone else holds `EDITING`.
    /// With exactly one known member (self), self holds both — there is
    /// no other candidate and a cluster of one still needs a gateway.
    fn build_role_vector(&self) -> Vec<(NodeAddress, HashSet<Role>)> {
        let snapshot = self.membership.snapshot();
        let self_addr = self.membership.self_address();

        let gateway_addr = if snapshot.len() == 1 {
            self_addr
        } else {
            snapshot
                .iter()
                .filter(|e| e.address != self_addr)
                .min_by_key(|e| e.priority)
                .map(|e| e.address)
                .unwrap_or(self_addr)
        };

        snapshot
            .into_iter()
            .map(|entry| {
                let mut roles = HashSet::new();

                if entry.address == self_addr {
                    roles.insert(Role::MessageBroker);
                }

                if entry.address == gateway_addr {
                    roles.insert(Role::Gateway);
                }

                if roles.is_empty() {
                    roles.insert(Role::Editing);
                }

                (entry.address, roles)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use primitives::Role;

    use crate::test_support::{supervisor, supervisor_with_counting_broker};

    #[tokio::test]
    async fn single_node_cluster_gives_self_both_broker_and_gateway() {
        let (mut s, _tx, _rx) = supervisor("10.0.0.1").await;

        s.become_leader().await;

        let self_addr = s.membership.self_address();
        let entry = s.membership.get(self_addr).unwrap();
        assert!(entry.roles.contains(&Role::MessageBroker));
        assert!(entry.roles.contains(&Role::Gateway));
    }

    #[tokio::test]
    async fn leader_assigns_gateway_to_smallest_priority_other_member() {
        let (mut s, _tx, _rx) = supervisor("10.0.0.5").await;
        let low: primitives::NodeAddress = "10.0.0.2".parse().unwrap();
        let mid: primitives::NodeAddress = "10.0.0.9".parse().unwrap();
        s.membership.upsert(low, Default::default());
        s.membership.upsert(mid, Default::default());

        s.become_leader().await;

        let self_addr = s.membership.self_address();
        assert!(s.membership.get(self_addr).unwrap().roles.contains(&Role::MessageBroker));
        assert!(s.membership.get(low).unwrap().roles.contains(&Role::Gateway));
        assert!(s.membership.get(mid).unwrap().roles.contains(&Role::Editing));
        assert!(!s.membership.get(low).unwrap().roles.contains(&Role::MessageBroker));
    }

    #[tokio::test]
    async fn persisting_an_unchanged_role_set_does_not_restart_collaborators() {
        let (mut s, broker, _tx, _rx) = supervisor_with_counting_broker("10.0.0.1").await;

        s.become_leader().await;
        assert_eq!(broker.start_count(), 1, "first persist must start the broker");

        let self_addr = s.membership.self_address();
        let vector = vec![(self_addr, s.local_roles.clone())];
        s.persist_role_vector(self_addr, vector).await;

        assert_eq!(
            broker.start_count(),
            1,
            "re-persisting the same role set must not restart the broker"
        );
    }
}
