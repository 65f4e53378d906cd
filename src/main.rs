use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use shortsbot::config::ConfigStore;
use shortsbot::logging;
use shortsbot::services::automation::AutomationSession;

/// Daily joke shorts for YouTube
#[derive(Debug, Parser)]
#[command(name = "shortsbot", version, about)]
struct Cli {
    /// Run the pipeline once and exit; the exit status reflects the result
    #[arg(long)]
    test: bool,

    /// Settings file, created with defaults when missing
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref());

    let config = ConfigStore::load(&cli.config);
    if let Err(errors) = config.validate() {
        for e in &errors {
            log::error!("[main] {}", e);
        }
        anyhow::bail!("invalid configuration in {}", cli.config.display());
    }
    config
        .create_directories()
        .context("failed to create working directories")?;

    let session = Arc::new(AutomationSession::new(config));

    if cli.test {
        log::info!("[main] Test run");
        let ok = session.run_once().await;
        if !ok {
            log::error!("[main] Test run failed");
            std::process::exit(1);
        }
        log::info!("[main] Test run succeeded");
        return Ok(());
    }

    if !session.start() {
        anyhow::bail!("scheduler did not start");
    }
    log::info!("[main] Waiting for the scheduled time, Ctrl-C to quit");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    session.stop();
    log::info!("[main] Shutting down");
    Ok(())
}
