use clap::Parser;
use itrack::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Merge settings file, environment and flags
    let settings = cli.settings()?;

    // Initialize logging
    cli.init_logging(&settings)?;

    // Execute command
    cli.execute(&settings).await?;

    Ok(())
}
