use std::collections::HashMap;

use membership::MembershipEntry;
use primitives::NodeAddress;
use serde::{Deserialize, Serialize};
use telemetry::{error, info};
use tokio::sync::broadcast::{self, Sender};
use tokio::sync::mpsc::UnboundedSender;

pub type Subscriber = UnboundedSender<Event>;
pub type Publisher = UnboundedSender<(Topic, Event)>;

/// The two outbound notifications a running node emits, plus the control
/// events used to drive the router itself (spec §6, §9 "object-with-event-
/// bus -> explicit channels").
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Event {
    #[default]
    NoOp,
    Stop,

    /// Emitted whenever the membership table changes. Carries a deep copy
    /// of every known entry.
    NodesChanged(Vec<MembershipEntry>),

    /// Emitted whenever the local node's own role set changes. `source`
    /// is the address of the COORDINATOR that issued the assignment (or
    /// the local address, when this node is the coordinator).
    RolesChanged {
        snapshot: Vec<MembershipEntry>,
        source: NodeAddress,
    },
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Topic {
    Control,
    Nodes,
    Roles,
}

pub type DirectedEvent = (Topic, Event);

/// Fans incoming events out to every subscriber of their topic. Mirrors the
/// teacher's `EventRouter`: one `broadcast` channel per topic, one `mpsc`
/// inbox feeding all of them.
pub struct EventRouter {
    topics: HashMap<Topic, Sender<Event>>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
        }
    }

    pub fn add_topic(&mut self, topic: Topic, size: Option<usize>) {
        let buffer = size.unwrap_or(16);
        let (tx, _) = broadcast::channel(buffer);

        self.topics.insert(topic, tx);
    }

    pub fn subscribe(&self, topic: &Topic) -> Result<broadcast::Receiver<Event>, crate::Error> {
        self.topics
            .get(topic)
            .map(|sender| sender.subscribe())
            .ok_or(crate::Error::NoSuchTopic(*topic))
    }

    /// Distributes all incoming events to subscribers until a `Stop` event
    /// is seen, at which point `Stop` is propagated to every topic and the
    /// router returns.
    pub async fn start(&mut self, event_rx: &mut tokio::sync::mpsc::UnboundedReceiver<DirectedEvent>) {
        while let Some((topic, event)) = event_rx.recv().await {
            if event == Event::Stop {
                info!("event router received stop signal");
                self.fan_out(Event::Stop, &topic);
                return;
            }

            self.fan_out(event, &topic);
        }
    }

    fn fan_out(&mut self, event: Event, topic: &Topic) {
        if let Some(sender) = self.topics.get_mut(topic) {
            // Err means there are currently no subscribers; that's routine, not an error.
            if let Err(err) = sender.send(event.clone()) {
                if sender.receiver_count() > 0 {
                    error!("failed to fan out event {event:?} to topic {topic:?}: {err:?}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;

    #[tokio::test]
    async fn subscribing_to_an_unregistered_topic_errors() {
        let router = EventRouter::new();
        assert!(router.subscribe(&Topic::Nodes).is_err());
    }

    #[tokio::test]
    async fn subscribers_receive_fanned_out_events() {
        let mut router = EventRouter::new();
        router.add_topic(Topic::Nodes, Some(8));

        let mut rx = router.subscribe(&Topic::Nodes).unwrap();

        let (event_tx, mut event_rx) = unbounded_channel::<DirectedEvent>();
        let handle = tokio::spawn(async move {
            router.start(&mut event_rx).await;
        });

        event_tx.send((Topic::Nodes, Event::NodesChanged(vec![]))).unwrap();
        event_tx.send((Topic::Control, Event::Stop)).unwrap();

        handle.await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), Event::NodesChanged(vec![]));
    }
}
