//! Internal event bus connecting the core dispatch loop to external
//! collaborators (spec §6: `nodes(snapshot)`, `roles(snapshot, source)`).
mod event;

pub use event::{DirectedEvent, Event, EventRouter, Publisher, Subscriber, Topic};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no subscribers registered for topic {0:?}")]
    NoSuchTopic(Topic),
}
