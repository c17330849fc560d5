use clap::Parser;
use cli::daemon::{self, DaemonOpts};
use telemetry::TelemetrySubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    TelemetrySubscriber::init(std::io::stdout)?;

    let opts = DaemonOpts::parse();
    daemon::run(opts).await?;

    Ok(())
}
