//! The discovery protocol, Bully election engine, role controller, and
//! supervisor that together implement the cluster membership and
//! coordination core (spec.md §4.5-4.8).
mod discovery;
mod election;
pub mod error;
mod roles;
mod supervisor;

#[cfg(test)]
mod test_support;

pub use error::{NodeError, Result};
pub use supervisor::{Collaborators, Supervisor, SupervisorHandle};
