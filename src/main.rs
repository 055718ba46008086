mod api;
mod auth;
mod cli;
mod commands;
mod config;
mod logger;
mod sandbox;
mod ui;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use sandbox::SshExit;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logger::init(cli.verbose) {
        eprintln!("warning: {e:#}");
    }

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // ssh already reported its own failure
            if let Some(exit) = e.downcast_ref::<SshExit>() {
                return ExitCode::from(u8::try_from(exit.code).unwrap_or(1));
            }
            ui::render_error(&ui::error_message(&e));
            ExitCode::FAILURE
        }
    }
}
