mod alias;
mod device_flow;

use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::config::{Config, normalize_url};

pub use alias::derive_alias;
pub use device_flow::{Clock, DeviceAuthApi, DeviceFlow, LoginPrompt, PollOutcome, SystemClock};

/// Fallback client name when the host name is unavailable.
const DEFAULT_CLIENT_NAME: &str = "cli";

pub struct LoginRequest<'a> {
    pub server_url: &'a str,
    pub alias: Option<&'a str>,
    pub client_name: &'a str,
    pub open_browser: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Alias the server is stored under; empty when none could be derived
    pub alias: String,
    pub server: String,
}

/// Name this machine presents to the server when requesting a device code.
pub fn client_name() -> String {
    sysinfo::System::host_name()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string())
}

/// Device login against `request.server_url`, storing the token in the
/// config at `config_path` on success. Nothing is written on failure.
pub async fn login<A, C, P>(
    api: &A,
    clock: &C,
    prompt: &P,
    config_path: &Path,
    request: &LoginRequest<'_>,
) -> Result<LoginOutcome>
where
    A: DeviceAuthApi,
    C: Clock,
    P: LoginPrompt,
{
    // Fail on a broken config before the user approves anything
    let mut config = Config::load_from(config_path)?;

    let token = DeviceFlow::new(api, clock, prompt)
        .open_browser(request.open_browser)
        .authorize(request.client_name)
        .await?;

    let alias = choose_alias(&config, request.server_url, request.alias);
    let entry = config
        .set_server(&alias, request.server_url, &token)
        .clone();
    config.save_to(config_path)?;

    info!(alias = %entry.alias, server = %entry.server, "login stored");
    Ok(LoginOutcome {
        alias: entry.alias,
        server: entry.server,
    })
}

/// Explicit alias, else the alias already stored for this URL, else one
/// derived from the URL. A derived alias never takes over another server's
/// entry: `sc` held by a different URL becomes `sc-2`, `sc-3`, ...
fn choose_alias(config: &Config, server_url: &str, explicit: Option<&str>) -> String {
    if let Some(alias) = explicit.map(str::trim).filter(|a| !a.is_empty()) {
        return alias.to_string();
    }

    let url = normalize_url(server_url);
    if let Some(existing) = config
        .servers
        .iter()
        .find(|s| s.server == url && !s.alias.is_empty())
    {
        return existing.alias.clone();
    }

    let Some(base) = derive_alias(&url) else {
        return String::new();
    };
    let taken = |alias: &str| config.servers.iter().any(|s| s.alias == alias);
    if !taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
