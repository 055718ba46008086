use anyhow::{Context, Result, anyhow};

use crate::api::{
    CreateSandboxRequest, SandboxStatus, SandcastleClient, Sandbox, UpdateSandboxRequest,
};
use crate::cli::{CreateArgs, Lifetime};
use crate::config::{ActiveSandbox, Config, resolve_sandbox_name};
use crate::sandbox::{
    TMUX_ATTACH, data_path, find_by_name, find_in, split_exec_args, ssh_exec, wait_for_ssh,
};
use crate::ui::{self, Cell, Table};

use super::{client, print_server};

const NO_SANDBOX_NAME: &str = "specify a sandbox name or set one with: sandcastle use <name>";

pub async fn list() -> Result<()> {
    let client = client()?;
    print_server(&client);

    let sandboxes = client.list_sandboxes().await?;
    if sandboxes.is_empty() {
        println!("No sandboxes.");
        return Ok(());
    }

    let has_route = sandboxes.iter().any(|s| !s.routes.is_empty());
    let mut headers = vec!["NAME", "STATUS", "PORT"];
    if has_route {
        headers.push("ROUTE");
    }
    headers.extend(["TAILSCALE IP", "IMAGE", "CREATED"]);

    let mut table = Table::new(&headers);
    for s in &sandboxes {
        let name = if s.temporary {
            format!("{} (temp)", s.name)
        } else {
            s.name.clone()
        };
        let mut row: Vec<Cell> = vec![
            name.into(),
            Cell::colored(s.status.display_name(), s.status.color()),
            s.ssh_port.map(|p| p.to_string()).unwrap_or_default().into(),
        ];
        if has_route {
            let routes: Vec<String> = s
                .routes
                .iter()
                .map(|r| format!("{} (:{})", r.url, r.port))
                .collect();
            row.push(routes.join(", ").into());
        }
        row.push(s.tailscale_ip.clone().unwrap_or_default().into());
        row.push(s.image.as_str().into());
        row.push(ui::time_ago(s.created_at, "").into());
        table.add_row(row);
    }
    table.print()
}

pub async fn create(args: CreateArgs) -> Result<()> {
    let client = client()?;
    print_server(&client);

    let data = data_path(args.data);
    let request = CreateSandboxRequest {
        name: args.name,
        image: args.image,
        persistent: args.persistent,
        snapshot: args.snapshot,
        tailscale: args.tailscale,
        mount_home: args.home,
        data_path: data.clone(),
        temporary: args.remove,
    };
    let sandbox = client.create_sandbox(&request).await?;

    ui::success(&format!("Sandbox {:?} created.", sandbox.name))?;
    if sandbox.mount_home {
        ui::field("Home", "mounted (~/ persisted)");
    }
    if let Some(data) = &data {
        let label = if data == "." { "user data root" } else { data.as_str() };
        ui::field("Data", &format!("mounted ({label} → /data)"));
    }
    if sandbox.persistent_volume {
        ui::field("Volume", "persistent (/workspace)");
    }
    if sandbox.tailscale {
        ui::field("Tailscale", "enabled");
    }
    if args.remove {
        ui::field("Cleanup", "auto-remove on exit");
    }

    if args.no_connect {
        return Ok(());
    }
    let session = attach(&client, &sandbox, Some(TMUX_ATTACH)).await;
    if args.remove {
        remove_if_temporary(&client, &sandbox).await;
    }
    session
}

/// Delete a `--rm` sandbox after its session, unless it was switched to
/// keep in the meantime. Returns whether it was removed.
async fn remove_if_temporary(client: &SandcastleClient, sandbox: &Sandbox) -> bool {
    // A failed lookup still removes: the sandbox was created temporary
    if let Ok(current) = client.get_sandbox(sandbox.id).await
        && !current.temporary
    {
        println!("Sandbox {:?} was set to keep, skipping removal.", sandbox.name);
        return false;
    }

    println!("Removing sandbox {:?}...", sandbox.name);
    match client.destroy_sandbox(sandbox.id).await {
        Ok(()) => {
            let _ = ui::success(&format!("Sandbox {:?} deleted.", sandbox.name));
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, sandbox = %sandbox.name, "auto-remove failed");
            eprintln!("Warning: failed to delete sandbox: {e}");
            false
        }
    }
}

pub async fn delete(name: &str) -> Result<()> {
    let client = client()?;
    print_server(&client);

    let sandbox = find_by_name(&client, name).await?;
    client.destroy_sandbox(sandbox.id).await?;
    ui::success(&format!("Sandbox {name:?} deleted."))
}

pub async fn start(name: &str) -> Result<()> {
    let client = client()?;
    print_server(&client);

    let sandbox = find_by_name(&client, name).await?;
    let sandbox = client.start_sandbox(sandbox.id).await?;
    ui::success(&format!("Sandbox {:?} started.", sandbox.name))
}

pub async fn stop(name: &str) -> Result<()> {
    let client = client()?;
    print_server(&client);

    let sandbox = find_by_name(&client, name).await?;
    let sandbox = client.stop_sandbox(sandbox.id).await?;
    ui::success(&format!("Sandbox {:?} stopped.", sandbox.name))
}

pub async fn set_lifetime(name: &str, mode: Lifetime) -> Result<()> {
    let client = client()?;
    print_server(&client);

    let sandbox = find_by_name(&client, name).await?;
    let request = UpdateSandboxRequest {
        temporary: mode == Lifetime::Temp,
    };
    let sandbox = client.update_sandbox(sandbox.id, &request).await?;

    if sandbox.temporary {
        ui::success(&format!(
            "Sandbox {:?} set to temporary (will be removed on exit).",
            sandbox.name
        ))
    } else {
        ui::success(&format!(
            "Sandbox {:?} set to keep (will not be removed on exit).",
            sandbox.name
        ))
    }
}

/// SSH in and attach tmux, starting the sandbox first when it is stopped.
pub async fn connect(name: Option<String>, active: Option<&str>) -> Result<()> {
    let name = resolve_sandbox_name(name, active).ok_or_else(|| anyhow!(NO_SANDBOX_NAME))?;
    let client = client()?;

    let mut sandbox = find_by_name(&client, &name).await?;
    if sandbox.status == SandboxStatus::Stopped {
        println!("Starting sandbox {name:?}...");
        sandbox = client
            .start_sandbox(sandbox.id)
            .await
            .context("Failed to start sandbox")?;
    }

    attach(&client, &sandbox, Some(TMUX_ATTACH)).await
}

pub async fn ssh(name: Option<String>, active: Option<&str>) -> Result<()> {
    let name = resolve_sandbox_name(name, active).ok_or_else(|| anyhow!(NO_SANDBOX_NAME))?;
    let client = client()?;

    let sandbox = find_by_name(&client, &name).await?;
    attach(&client, &sandbox, None).await
}

pub async fn exec(args: &[String], active: Option<&str>) -> Result<()> {
    let client = client()?;
    let sandboxes = client.list_sandboxes().await?;

    let (name, command) = split_exec_args(args, &sandboxes, active)?;
    let sandbox = find_in(&sandboxes, &name)?;

    let info = client.connect_info(sandbox.id).await?;
    ssh_exec(&info, Some(&command)).await
}

async fn attach(client: &SandcastleClient, sandbox: &Sandbox, command: Option<&str>) -> Result<()> {
    let info = client.connect_info(sandbox.id).await?;
    tracing::debug!(host = %info.host, port = info.port, user = %info.user, "connection info");

    wait_for_ssh(&info).await?;
    ssh_exec(&info, command).await
}

/// Show the current server and active sandbox, or set the active sandbox.
pub fn use_sandbox(name: Option<String>, marker: &ActiveSandbox) -> Result<()> {
    let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
        let config = Config::load()?;
        match config.current() {
            Some(entry) => ui::field("Server", &entry.server),
            None => ui::field("Server", "(none)"),
        }
        ui::field("Sandbox", marker.read().as_deref().unwrap_or("(none)"));
        return Ok(());
    };

    marker.write(&name)?;
    ui::success(&format!("Active sandbox set to {:?}", name.trim()))?;
    ui::hint(&format!("Saved in {}", marker.path().display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Connection;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn temporary_sandbox_server(still_temporary: bool, deletes: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sandboxes/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 5, "name": "scratch", "status": "running", "temporary": still_temporary
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/sandboxes/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "destroyed"})))
            .expect(deletes)
            .mount(&server)
            .await;
        server
    }

    fn scratch() -> Sandbox {
        serde_json::from_value(json!({"id": 5, "name": "scratch", "temporary": true})).unwrap()
    }

    fn client_for(server: &MockServer) -> SandcastleClient {
        SandcastleClient::new(&Connection {
            url: server.uri(),
            token: "tok".to_string(),
            insecure: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_rm_sandbox_removed_after_session() {
        let server = temporary_sandbox_server(true, 1).await;
        assert!(remove_if_temporary(&client_for(&server), &scratch()).await);
    }

    #[tokio::test]
    async fn test_rm_sandbox_switched_to_keep_survives() {
        let server = temporary_sandbox_server(false, 0).await;
        assert!(!remove_if_temporary(&client_for(&server), &scratch()).await);
    }

    #[test]
    fn test_use_sandbox_writes_marker() {
        let dir = TempDir::new().unwrap();
        let marker = ActiveSandbox::in_dir(dir.path());

        use_sandbox(Some("devbox".to_string()), &marker).unwrap();
        assert_eq!(marker.read().as_deref(), Some("devbox"));
    }
}
