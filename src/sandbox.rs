mod ssh;

use anyhow::{Result, anyhow};

use crate::api::{SandcastleClient, Sandbox};

pub use ssh::{SshExit, TMUX_ATTACH, ssh_exec, wait_for_ssh};

/// Look a sandbox up by name among those visible to the current token.
pub async fn find_by_name(client: &SandcastleClient, name: &str) -> Result<Sandbox> {
    let sandboxes = client.list_sandboxes().await?;
    find_in(&sandboxes, name).cloned()
}

pub fn find_in<'a>(sandboxes: &'a [Sandbox], name: &str) -> Result<&'a Sandbox> {
    sandboxes
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| anyhow!("sandbox {name:?} not found"))
}

/// Split `exec` arguments into sandbox name and remote command.
///
/// The first argument names the sandbox when it is one of `known`. Otherwise
/// the active sandbox is used and every argument belongs to the command.
pub fn split_exec_args(
    args: &[String],
    known: &[Sandbox],
    active: Option<&str>,
) -> Result<(String, String)> {
    let Some((first, rest)) = args.split_first() else {
        anyhow::bail!("specify a sandbox and a command: sandcastle exec <name> -- <command...>");
    };

    let (name, command) = if known.iter().any(|s| &s.name == first) {
        (first.clone(), rest)
    } else {
        let active = active.ok_or_else(|| {
            anyhow!("sandbox {first:?} not found and no active sandbox set")
        })?;
        (active.to_string(), args)
    };

    let command: Vec<&str> = command
        .iter()
        .map(String::as_str)
        .skip_while(|a| *a == "--")
        .collect();
    if command.is_empty() {
        anyhow::bail!("no command given for sandbox {name:?}");
    }

    Ok((name, command.join(" ")))
}

/// `--data` value as sent to the server. `1` and `true` (the forms
/// `SANDCASTLE_DATA` is usually set to) mean the data root, like a bare `--data`.
pub fn data_path(value: Option<String>) -> Option<String> {
    let value = value?;
    match value.trim() {
        "" => None,
        "1" | "true" => Some(".".to_string()),
        _ => Some(value),
    }
}

/// Accept both a full image reference (`repo:name`) and a bare snapshot name.
pub fn snapshot_name(reference: &str) -> &str {
    reference
        .split_once(':')
        .map_or(reference, |(_, name)| name)
}
