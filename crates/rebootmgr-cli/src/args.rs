use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use rebootmgr_config::settings::DEFAULT_SOCKET_PATH;

/// Control the rebootmgr daemon.
#[derive(Debug, Parser)]
#[command(name = "rebootmgrctl", version, about, long_about = None)]
pub struct Cli {
    /// Control socket of the daemon.
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Only accepted value of the optional `reboot` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum When {
    /// Skip the strategy and reboot immediately.
    Now,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Request a reboot according to the configured strategy.
    Reboot {
        #[arg(ignore_case = true)]
        when: Option<When>,
    },

    /// Request a soft reboot according to the configured strategy.
    SoftReboot {
        #[arg(ignore_case = true)]
        when: Option<When>,
    },

    /// Cancel a requested reboot.
    Cancel,

    /// Show whether a reboot is requested.
    Status {
        /// Print nothing; the exit code is the status value.
        #[arg(short, long, conflicts_with = "full")]
        quiet: bool,

        /// Also show strategy and maintenance window.
        #[arg(long)]
        full: bool,
    },

    /// Check whether the daemon answers.
    IsActive {
        /// Print nothing; only set the exit code.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Set the reboot strategy.
    SetStrategy { strategy: String },

    /// Show the reboot strategy.
    GetStrategy,

    /// Set the maintenance window, e.g. `set-window "Sat 04:00" 1h30m`.
    #[command(alias = "set_window")]
    SetWindow { start: String, duration: String },

    /// Show the maintenance window.
    GetWindow,
}
