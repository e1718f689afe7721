#![deny(unsafe_code)]

//! rebootmgrctl: control the rebootmgr daemon.

use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use rebootmgr_cli::args::Cli;
use rebootmgr_cli::{commands, logging};
use rebootmgr_core::IpcClient;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    logging::init(&logging::level_for(cli.verbose, "warn"));

    let client = IpcClient::new(&cli.socket);
    let mut stdout = std::io::stdout().lock();
    let result = commands::run(&client, &cli.command, &mut stdout).await;
    ExitCode::from(commands::exit_code(result, &mut std::io::stderr()))
}
