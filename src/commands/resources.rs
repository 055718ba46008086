use std::io::{self, Write};

use anyhow::{Result, bail};

use crate::api::{RouteRequest, ServerInfo, TailscaleStatus};
use crate::cli::{RouteAction, SnapshotAction, TailscaleAction, TokenAction};
use crate::sandbox::{find_by_name, snapshot_name};
use crate::ui::{self, Table};

use super::{client, print_server};

pub async fn route(action: RouteAction) -> Result<()> {
    let client = client()?;

    match action {
        RouteAction::Add {
            sandbox,
            domain,
            port,
        } => {
            let sandbox = find_by_name(&client, &sandbox).await?;
            let route = client
                .add_route(sandbox.id, &RouteRequest { domain, port })
                .await?;

            ui::success(&format!("Route added for sandbox {:?}.", sandbox.name))?;
            ui::field("Domain", &route.domain);
            ui::field("Port", &route.port.to_string());
            ui::field("URL", &route.url);
            println!();
            ui::hint("Point your DNS to this server; TLS is handled automatically.");
        }
        RouteAction::List { sandbox } => {
            let sandbox = find_by_name(&client, &sandbox).await?;
            let routes = client.list_routes(sandbox.id).await?;
            if routes.is_empty() {
                println!("No routes for sandbox {:?}.", sandbox.name);
                return Ok(());
            }

            let mut table = Table::new(&["DOMAIN", "PORT", "URL"]);
            for r in &routes {
                table.add_row(vec![
                    r.domain.as_str().into(),
                    r.port.to_string().into(),
                    r.url.as_str().into(),
                ]);
            }
            table.print()?;
        }
        RouteAction::Delete { sandbox, domain } => {
            let sandbox = find_by_name(&client, &sandbox).await?;
            client.remove_route(sandbox.id, &domain).await?;
            ui::success(&format!(
                "Route {domain:?} removed from sandbox {:?}.",
                sandbox.name
            ))?;
        }
    }
    Ok(())
}

pub async fn snapshot(action: SnapshotAction) -> Result<()> {
    let client = client()?;

    match action {
        SnapshotAction::Create { sandbox, name } => {
            let sandbox = find_by_name(&client, &sandbox).await?;
            let snap = client.snapshot_sandbox(sandbox.id, name).await?;

            ui::success(&format!(
                "Snapshot {:?} created from sandbox {:?}",
                snap.name, sandbox.name
            ))?;
            ui::field("Image", &snap.image);
        }
        SnapshotAction::List => {
            let snapshots = client.list_snapshots().await?;
            if snapshots.is_empty() {
                println!("No snapshots.");
                return Ok(());
            }

            let mut table = Table::new(&["NAME", "SANDBOX", "IMAGE", "SIZE", "CREATED"]);
            for s in &snapshots {
                table.add_row(vec![
                    s.name.as_str().into(),
                    s.sandbox.as_deref().unwrap_or("-").into(),
                    s.image.as_str().into(),
                    ui::format_size(s.size).into(),
                    ui::time_ago(s.created_at, "-").into(),
                ]);
            }
            table.print()?;
        }
        SnapshotAction::Destroy { name } => {
            client.destroy_snapshot(&name).await?;
            ui::success(&format!("Snapshot {name:?} destroyed."))?;
        }
        SnapshotAction::Restore { sandbox, snapshot } => {
            let target = find_by_name(&client, &sandbox).await?;
            let restored = client
                .restore_sandbox(target.id, snapshot_name(&snapshot))
                .await?;
            ui::success(&format!(
                "Sandbox {:?} restored from snapshot {snapshot:?}",
                restored.name
            ))?;
        }
    }
    Ok(())
}

pub async fn token(action: TokenAction) -> Result<()> {
    let client = client()?;

    match action {
        TokenAction::List => {
            let tokens = client.list_tokens().await?;
            if tokens.is_empty() {
                println!("No API tokens found.");
                ui::hint("Run 'sandcastle login <url>' to create one for this machine.");
                return Ok(());
            }

            let mut table = Table::new(&["ID", "NAME", "PREFIX", "CREATED", "LAST USED", "EXPIRES"]);
            for t in &tokens {
                table.add_row(vec![
                    t.id.to_string().into(),
                    t.name.as_str().into(),
                    t.prefix.as_str().into(),
                    ui::time_ago(Some(t.created_at), "").into(),
                    ui::time_ago(t.last_used_at, "Never").into(),
                    ui::time_ago(t.expires_at, "Never").into(),
                ]);
            }
            table.print()?;
        }
        TokenAction::Revoke { id } => {
            client.destroy_token(id).await?;
            ui::success(&format!("Revoked token ID {id}"))?;
        }
    }
    Ok(())
}

pub async fn status() -> Result<()> {
    let client = client()?;
    print_server(&client);

    let status = client.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub async fn info() -> Result<()> {
    let client = client()?;
    print_server(&client);

    let info = client.info().await?;
    println!();
    for line in info_lines(&info) {
        println!("{line}");
    }
    Ok(())
}

fn info_lines(info: &ServerInfo) -> Vec<String> {
    let host = &info.host;
    let rows: [Option<(&str, String)>; 16] = [
        Some(("Version", info.version.clone())),
        Some(("Rails", info.rails.clone())),
        Some(("Ruby", info.ruby.clone())),
        Some(("Docker", info.docker.version.clone())),
        None,
        Some(("Uptime", host.uptime.clone())),
        Some(("CPUs", host.cpu_count.to_string())),
        Some((
            "Load",
            format!(
                "{:.2} / {:.2} / {:.2}",
                host.load.one, host.load.five, host.load.fifteen
            ),
        )),
        None,
        Some((
            "Memory",
            format!(
                "{:.1} / {:.1} GB ({:.0}% used)",
                host.memory.used_gb, host.memory.total_gb, host.memory.percent
            ),
        )),
        Some((
            "Disk",
            format!(
                "{:.1} / {:.1} GB ({:.0}% used)",
                host.disk.used_gb, host.disk.total_gb, host.disk.percent
            ),
        )),
        None,
        Some((
            "Sandboxes",
            format!(
                "{} running, {} stopped, {} total",
                info.sandboxes.running, info.sandboxes.stopped, info.sandboxes.total
            ),
        )),
        Some((
            "Containers",
            format!(
                "{} running, {} total",
                info.docker.containers_running, info.docker.containers
            ),
        )),
        Some(("Images", info.docker.images.to_string())),
        Some((
            "Users",
            format!("{} ({} admins)", info.users.total, info.users.admins),
        )),
    ];

    let width = rows
        .iter()
        .flatten()
        .map(|(label, _)| label.len() + 1)
        .max()
        .unwrap_or(0);
    rows.iter()
        .map(|row| match row {
            Some((label, value)) => format!("{:<width$}  {value}", format!("{label}:")),
            None => String::new(),
        })
        .collect()
}

pub async fn tailscale(action: TailscaleAction) -> Result<()> {
    let client = client()?;

    match action {
        TailscaleAction::Enable { auth_key } => {
            let auth_key = match auth_key.filter(|k| !k.trim().is_empty()) {
                Some(key) => key.trim().to_string(),
                None => prompt_auth_key()?,
            };
            client.tailscale_enable(&auth_key).await?;

            ui::success("Tailscale auth key saved.")?;
            ui::hint("Create sandboxes with --tailscale to connect them to your tailnet.");
        }
        TailscaleAction::Disable => {
            client.tailscale_disable().await?;
            ui::success("Tailscale auth key removed.")?;
        }
        TailscaleAction::Status => {
            let status = client.tailscale_status().await?;
            print_tailscale_status(&status)?;
        }
    }
    Ok(())
}

fn prompt_auth_key() -> Result<String> {
    println!("Paste a reusable Tailscale auth key.");
    println!("Generate one at: Tailscale Admin > Settings > Keys");
    println!();
    print!("Auth key: ");
    io::stdout().flush()?;

    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    let key = key.trim();
    if key.is_empty() {
        bail!("no auth key provided");
    }
    Ok(key.to_string())
}

fn print_tailscale_status(status: &TailscaleStatus) -> Result<()> {
    let state = if status.running { "running" } else { "stopped" };
    ui::field("Sidecar", state);
    for (label, value) in [
        ("IP", &status.tailscale_ip),
        ("Hostname", &status.hostname),
        ("Tailnet", &status.tailnet),
        ("Network", &status.network),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            ui::field(label, value);
        }
    }
    ui::field("Sandboxes", &status.connected_sandboxes.to_string());

    if status.sandboxes.is_empty() {
        return Ok(());
    }
    println!();
    let mut table = Table::new(&["SANDBOX", "TAILSCALE IP"]);
    for s in &status.sandboxes {
        table.add_row(vec![
            s.name.as_str().into(),
            s.ip.as_deref().unwrap_or("-").into(),
        ]);
    }
    table.print()
}
