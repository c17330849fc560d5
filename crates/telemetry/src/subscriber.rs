use std::env;

use thiserror::Error;
use tracing_subscriber::{
    fmt::MakeWriter,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to initialize: {0}")]
    Init(#[from] TryInitError),

    #[error("{0}")]
    Other(String),
}

type Result<T> = std::result::Result<T, TelemetryError>;

/// Set to have logs rendered as pretty, human readable text instead of
/// single-line JSON. Meant for local development.
const LOCAL_ENV_VAR: &str = "CLUSTER_ENV";

// TODO: figure out the proper generic sig to export a telemetry builder instead
#[derive(Debug)]
pub struct TelemetrySubscriber {}

impl TelemetrySubscriber {
    pub fn init<W>(out: W) -> Result<()>
    where
        W: for<'s> MakeWriter<'s> + 'static + Sync + Send,
    {
        let is_local_env = env::var(LOCAL_ENV_VAR).as_deref() == Ok("local");

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        if is_local_env {
            let sub = tracing_subscriber::fmt()
                .with_writer(out)
                .with_env_filter(filter)
                .with_file(true)
                .with_line_number(true)
                .finish();

            sub.try_init()?;
        } else {
            let sub = tracing_subscriber::fmt()
                .with_writer(out)
                .with_env_filter(filter)
                .json()
                .with_current_span(false)
                .flatten_event(true)
                .with_span_list(false)
                .finish();

            sub.try_init()?;
        }

        Ok(())
    }
}
