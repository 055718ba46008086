mod resources;
mod sandbox;
mod server;

use anyhow::{Context, Result};

use crate::api::SandcastleClient;
use crate::cli::{Cli, Commands, ConfigAction};
use crate::config::{ActiveSandbox, Config};
use crate::ui;

/// Single entry point: every subcommand is dispatched from here.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login {
            url,
            alias,
            no_browser,
        } => server::login(&url, alias.as_deref(), no_browser).await,
        Commands::Server { action } => server::run(action),
        Commands::Config {
            action: ConfigAction::Show,
        } => server::config_show(),
        Commands::List => sandbox::list().await,
        Commands::Create(args) => sandbox::create(args).await,
        Commands::Delete { name } => sandbox::delete(&name).await,
        Commands::Start { name } => sandbox::start(&name).await,
        Commands::Stop { name } => sandbox::stop(&name).await,
        Commands::Set { name, mode } => sandbox::set_lifetime(&name, mode).await,
        Commands::Connect { name } => sandbox::connect(name, active_sandbox()?.as_deref()).await,
        Commands::Ssh { name } => sandbox::ssh(name, active_sandbox()?.as_deref()).await,
        Commands::Exec { args } => sandbox::exec(&args, active_sandbox()?.as_deref()).await,
        Commands::Use { name } => sandbox::use_sandbox(name, &ActiveSandbox::current_dir()?),
        Commands::Route { action } => resources::route(action).await,
        Commands::Snapshot { action } => resources::snapshot(action).await,
        Commands::Token { action } => resources::token(action).await,
        Commands::Tailscale { action } => resources::tailscale(action).await,
        Commands::Status => resources::status().await,
        Commands::Info => resources::info().await,
    }
}

/// Active sandbox marker for the working directory, read once per command.
fn active_sandbox() -> Result<Option<String>> {
    Ok(ActiveSandbox::current_dir()?.read())
}

/// Authenticated client for the current server.
fn client() -> Result<SandcastleClient> {
    let config = Config::load()?;
    let connection = config.connection()?;
    SandcastleClient::new(&connection).context("Failed to create API client")
}

fn print_server(client: &SandcastleClient) {
    ui::hint(&format!("Server: {}", client.base_url()));
}
