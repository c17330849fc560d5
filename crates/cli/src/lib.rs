//! Shared pieces behind the `clusterd` daemon and `cluster-cli` inspection
//! binaries: the control-socket wire protocol, the status cache the daemon
//! keeps current from its own event bus, and the daemon/inspect run loops
//! each binary's thin `main` delegates into (teacher precedent: `cli::run`
//! in the upstream `cli` crate's `src/lib.rs`).
pub mod control;
pub mod daemon;
pub mod inspect;
pub mod result;
pub mod status_cache;

pub use result::{CliError, Result};
