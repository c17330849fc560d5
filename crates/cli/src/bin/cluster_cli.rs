use clap::Parser;
use cli::inspect::{self, InspectOpts};
use telemetry::TelemetrySubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    TelemetrySubscriber::init(std::io::stdout)?;

    let opts = InspectOpts::parse();
    inspect::run(opts).await?;

    Ok(())
}
