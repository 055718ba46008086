use anyhow::Result;
use crossterm::style::Color;

use crate::api::SandcastleClient;
use crate::auth::{self, LoginRequest, SystemClock};
use crate::cli::ServerAction;
use crate::config::{
    Config, ServerEntry, TOKEN_ENV, TokenSource, mask_token, parse_server_url,
};
use crate::ui::{self, Cell, Table, TerminalPrompt};

pub async fn login(url: &str, alias: Option<&str>, no_browser: bool) -> Result<()> {
    let server_url = parse_server_url(url)?;
    let config_path = Config::config_path()?;

    // Keep the TLS setting of a server that is already configured
    let insecure = Config::load_from(&config_path)?
        .find_server(&server_url)
        .is_some_and(|s| s.insecure);
    let api = SandcastleClient::anonymous(&server_url, insecure)?;

    println!("Logging in to {server_url}");
    let client_name = auth::client_name();
    let prompt = TerminalPrompt::default();
    let outcome = auth::login(
        &api,
        &SystemClock,
        &prompt,
        &config_path,
        &LoginRequest {
            server_url: &server_url,
            alias,
            client_name: &client_name,
            open_browser: !no_browser,
        },
    )
    .await?;

    ui::success(&format!("Logged in to {}", outcome.server))?;
    if !outcome.alias.is_empty() {
        ui::field("Alias", &outcome.alias);
    }
    Ok(())
}

pub fn run(action: ServerAction) -> Result<()> {
    match action {
        ServerAction::Add {
            url,
            alias,
            insecure,
        } => add(&url, alias.as_deref(), insecure),
        ServerAction::List => list(),
        ServerAction::Use { server } => use_server(&server),
        ServerAction::Remove { server } => remove(&server),
    }
}

fn add(url: &str, alias: Option<&str>, insecure: bool) -> Result<()> {
    let url = parse_server_url(url)?;
    let mut config = Config::load()?;

    let mut entry = ServerEntry::new(alias.map(str::trim).unwrap_or_default(), &url);
    entry.insecure = insecure;
    config.add_server(entry)?;
    config.save()?;

    if config.servers.len() == 1 {
        ui::success(&format!("Added server {url} (set as current)"))?;
    } else {
        ui::success(&format!("Added server {url}"))?;
    }
    ui::hint(&format!("Run 'sandcastle login {url}' to authenticate."));
    Ok(())
}

fn list() -> Result<()> {
    let config = Config::load()?;

    if config.servers.is_empty() {
        println!("No servers configured. Run: sandcastle login <url>");
        return Ok(());
    }

    let mut table = Table::new(&["", "ALIAS", "SERVER", "TOKEN"]);
    for entry in &config.servers {
        let marker = if config.is_current(entry) {
            Cell::colored("*", Color::Green)
        } else {
            " ".into()
        };
        let mut server = entry.server.clone();
        if entry.insecure {
            server.push_str(" (insecure)");
        }
        table.add_row(vec![
            marker,
            entry.alias.as_str().into(),
            server.into(),
            mask_token(&entry.token).into(),
        ]);
    }
    table.print()
}

fn use_server(alias_or_url: &str) -> Result<()> {
    let mut config = Config::load()?;
    let entry = config.use_server(alias_or_url)?.clone();
    config.save()?;

    ui::success(&format!("Switched to {}", entry.server))
}

fn remove(alias_or_url: &str) -> Result<()> {
    let mut config = Config::load()?;
    let removed = config.remove_server(alias_or_url)?;
    config.save()?;

    ui::success(&format!("Removed server {}", removed.server))?;
    if config.current_server.is_empty() && !config.servers.is_empty() {
        ui::hint("No current server. Run: sandcastle server use <alias-or-url>");
    }
    Ok(())
}

fn token_source_label(source: TokenSource) -> String {
    match source {
        TokenSource::Env => format!("env ({TOKEN_ENV})"),
        TokenSource::Config => "config".to_string(),
        TokenSource::Missing => "missing".to_string(),
        TokenSource::InvalidEnvWhitespace => format!("invalid: {TOKEN_ENV} is whitespace-only"),
        TokenSource::InvalidConfigWhitespace => {
            "invalid: stored token is whitespace-only".to_string()
        }
    }
}

pub fn config_show() -> Result<()> {
    let config_path = Config::config_path()?;
    let config = Config::load_from(&config_path)?;

    println!("# {}", config_path.display());
    println!();

    let Some(entry) = config.current() else {
        if config.current_server.is_empty() {
            println!("Server: (none)");
        } else {
            println!("Server: {} (not configured)", config.current_server);
        }
        println!();
        println!("Run 'sandcastle login <url>' or 'sandcastle server add <url>'.");
        return Ok(());
    };

    if !entry.alias.is_empty() {
        println!("Alias:  {}", entry.alias);
    }
    println!("Server: {}", entry.server);
    if entry.insecure {
        println!("TLS:    certificate checks disabled");
    }

    let source = config.token_source();
    let token = match source {
        TokenSource::Env => std::env::var(TOKEN_ENV)
            .map(|t| mask_token(t.trim()))
            .unwrap_or_default(),
        _ => mask_token(&entry.token),
    };
    println!("Token:  {token}");
    println!();
    println!("# Token source: {}", token_source_label(source));
    println!("# Servers configured: {}", config.servers.len());
    Ok(())
}
