use anyhow::Result;
use vetrina::cli::start;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args, set up telemetry, and run the selected action.
    let action = start()?;

    action.execute().await
}
