//! Discovery protocol (spec §4.5, C5): UDP broadcast JOIN, unicast HELLO/
//! ACK HELLO transactions, and the pre-election debounce every membership
//! addition arms.
use std::collections::HashSet;

use primitives::NodeAddress;
use telemetry::info;
use wire::{Message, NodeDescriptor};

use crate::supervisor::{DispatchEvent, Supervisor};

impl Supervisor {
    /// Broadcasts JOIN every `MESSAGE_INTERVAL` until the first HELLO is
    /// received (spec §4.5 step 1).
    pub(crate) fn start_join_loop(&mut self) {
        self.join_timer
            .set_interval(self.config.message_interval, DispatchEvent::JoinTick);
    }

    pub(crate) async fn send_join(&self) {
        self.broadcast(&Message::Join).await;
    }

    /// Stops the own broadcast JOIN loop. Idempotent — called from both
    /// the HELLO and ACK HELLO paths (spec §4.5 steps 3-4, property P5).
    fn stop_join_loop(&mut self) {
        self.join_timer.cancel();
    }

    pub(crate) async fn on_join(&mut self, from: NodeAddress) {
        info!("received JOIN from {from}");

        if self.hello_intervals.contains(&from) {
            return;
        }

        self.upsert_and_maybe_debounce(from, HashSet::new());

        self.hello_intervals
            .set_interval(from, self.config.message_interval, DispatchEvent::HelloTick(from));
        self.hello_timeouts
            .set_timeout(from, self.config.message_timeout, DispatchEvent::HelloTimeout(from));
    }

    pub(crate) async fn send_hello(&self, peer: NodeAddress) {
        self.unicast(peer, &Message::Hello(self.node_list_payload())).await;
    }

    pub(crate) async fn on_hello_timeout(&mut self, peer: NodeAddress) {
        self.hello_intervals.cancel(&peer);
    }

    pub(crate) async fn on_hello(&mut self, from: NodeAddress, nodes: Vec<NodeDescriptor>) {
        info!("received HELLO from {from}");

        self.stop_join_loop();
        self.merge_node_list(nodes);

        self.unicast(from, &Message::AckHello(self.node_list_payload())).await;

        self.hello_intervals.cancel(&from);
        self.hello_timeouts.cancel(&from);
    }

    pub(crate) async fn on_ack_hello(&mut self, from: NodeAddress, nodes: Vec<NodeDescriptor>) {
        info!("received ACK HELLO from {from}");

        self.hello_intervals.cancel(&from);
        self.hello_timeouts.cancel(&from);

        self.merge_node_list(nodes);
        self.stop_join_loop();
    }

    /// Merges a received node list, ignoring the self-entry and never
    /// trusting the wire's priority claim (spec §4.5 "tie-break and
    /// dedupe", §9 "priority is local-only").
    fn merge_node_list(&mut self, nodes: Vec<NodeDescriptor>) {
        for descriptor in nodes {
            self.upsert_and_maybe_debounce(descriptor.address, descriptor.roles);
        }
    }

    /// Any membership addition re-arms the pre-election debounce (spec
    /// §4.5 "upsert returning added=true ... triggers the pre-election
    /// debounce", §9 "every membership add resets it").
    fn upsert_and_maybe_debounce(&mut self, address: NodeAddress, roles: HashSet<primitives::Role>) {
        if address == self.membership.self_address() {
            return;
        }

        let result = self.membership.upsert(address, roles);

        if result.added || result.roles_changed {
            self.emit_nodes_changed();
        }

        if result.added {
            self.pre_election_timer
                .set_timeout(self.config.preelection_timeout, DispatchEvent::PreElectionTimeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::test_support::supervisor;

    #[tokio::test]
    async fn receiving_join_arms_hello_interval_and_timeout() {
        let (mut s, _tx, _rx) = supervisor("10.0.0.1").await;
        let peer: primitives::NodeAddress = "10.0.0.2".parse().unwrap();

        s.on_join(peer).await;

        assert!(s.membership.contains(peer));
        assert!(s.hello_intervals.contains(&peer));
        assert!(s.hello_timeouts.contains(&peer));
    }

    #[tokio::test]
    async fn duplicate_join_does_not_rearm_hello_timers() {
        let (mut s, _tx, _rx) = supervisor("10.0.0.1").await;
        let peer: primitives::NodeAddress = "10.0.0.2".parse().unwrap();

        s.on_join(peer).await;
        s.on_join(peer).await;

        assert!(s.hello_intervals.contains(&peer));
    }

    #[tokio::test]
    async fn hello_cancels_own_join_loop_and_peer_timers() {
        let (mut s, _tx, _rx) = supervisor("10.0.0.1").await;
        s.start_join_loop();

        let peer: primitives::NodeAddress = "10.0.0.2".parse().unwrap();
        s.hello_intervals.set_interval(peer, Duration::from_millis(10), crate::supervisor::DispatchEvent::HelloTick(peer));

        s.on_hello(peer, vec![]).await;

        assert!(!s.join_timer.is_armed());
        assert!(!s.hello_intervals.contains(&peer));
    }

    #[tokio::test]
    async fn merging_node_list_never_duplicates_self() {
        let (mut s, _tx, _rx) = supervisor("10.0.0.1").await;
        let self_addr: primitives::NodeAddress = "10.0.0.1".parse().unwrap();

        s.on_hello(
            "10.0.0.2".parse().unwrap(),
            vec![wire::NodeDescriptor {
                address: self_addr,
                roles: Default::default(),
            }],
        )
        .await;

        assert_eq!(s.membership.len(), 1);
    }
}
