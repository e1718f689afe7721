#![deny(unsafe_code)]

//! rebootmgrd: the reboot manager daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use rebootmgr_cli::logging;
use rebootmgr_config::AppConfig;
use rebootmgr_config::settings::DEFAULT_SETTINGS_PATH;
use rebootmgr_core::Daemon;

/// Reboot manager daemon.
#[derive(Parser)]
#[command(name = "rebootmgrd", version, about, long_about = None)]
struct Args {
    /// Daemon settings file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    /// Override the settings' log level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the effective settings as TOML and exit.
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load_or_default(&args.config)
        .await
        .with_context(|| format!("cannot load settings from {}", args.config.display()))?;

    if args.dump_config {
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
        return Ok(());
    }

    logging::init(&logging::level_for(args.verbose, &config.logging.level));
    info!(
        settings = %args.config.display(),
        version = %rebootmgr_core::build_info::version_string(),
        "Starting rebootmgrd"
    );

    let daemon = Daemon::bootstrap(config)
        .await
        .context("cannot resolve reboot configuration")?;
    daemon.run().await.context("daemon failed")?;
    Ok(())
}
