use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{Instant, sleep, timeout};
use tracing::debug;

use crate::api::ConnectInfo;
use crate::ui;

const READY_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_millis(500);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Remote command that attaches (or creates) the shared tmux session.
pub const TMUX_ATTACH: &str = "tmux new-session -A -s main";

/// The ssh process ran but exited unsuccessfully.
#[derive(Debug, Error)]
#[error("ssh exited with status {code}")]
pub struct SshExit {
    pub code: i32,
}

/// Block until the sandbox accepts TCP connections on its SSH port.
pub async fn wait_for_ssh(info: &ConnectInfo) -> Result<()> {
    let addr = format!("{}:{}", info.host, info.port);
    let pb = ui::spinner("Waiting for SSH to be ready...");
    let result = wait_for_port(&addr, READY_TIMEOUT, RETRY_DELAY, CONNECT_TIMEOUT, || {
        pb.tick()
    })
    .await;
    pb.finish_and_clear();
    result
}

async fn wait_for_port(
    addr: &str,
    deadline: Duration,
    retry_delay: Duration,
    connect_timeout: Duration,
    on_retry: impl Fn(),
) -> Result<()> {
    let start = Instant::now();

    loop {
        match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => return Ok(()),
            Ok(Err(e)) => debug!(addr, error = %e, "ssh port not ready"),
            Err(_) => debug!(addr, "ssh connect attempt timed out"),
        }

        if start.elapsed() + retry_delay >= deadline {
            anyhow::bail!("timeout waiting for SSH at {addr}");
        }
        on_retry();
        sleep(retry_delay).await;
    }
}

fn ssh_args(info: &ConnectInfo, remote_command: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        info.port.to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-o".to_string(),
        "LogLevel=ERROR".to_string(),
        format!("{}@{}", info.user, info.host),
    ];
    if let Some(cmd) = remote_command.filter(|c| !c.is_empty()) {
        args.push("-t".to_string());
        args.push(cmd.to_string());
    }
    args
}

/// Run `ssh` with inherited stdio. A non-zero exit becomes [`SshExit`].
pub async fn ssh_exec(info: &ConnectInfo, remote_command: Option<&str>) -> Result<()> {
    let ssh = which::which("ssh").context("ssh not found in PATH")?;
    let args = ssh_args(info, remote_command);
    debug!(ssh = %ssh.display(), host = %info.host, port = info.port, "starting ssh");

    let status = Command::new(&ssh)
        .args(&args)
        .status()
        .await
        .context("Failed to start ssh")?;

    if status.success() {
        Ok(())
    } else {
        // Killed by a signal: no exit code
        Err(SshExit {
            code: status.code().unwrap_or(1),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use tokio::net::TcpListener;

    fn info() -> ConnectInfo {
        ConnectInfo {
            host: "sc.example.com".to_string(),
            port: 2201,
            user: "dev".to_string(),
        }
    }

    #[test]
    fn test_ssh_args_with_command() {
        assert_eq!(
            ssh_args(&info(), Some(TMUX_ATTACH)),
            vec![
                "-p",
                "2201",
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "UserKnownHostsFile=/dev/null",
                "-o",
                "LogLevel=ERROR",
                "dev@sc.example.com",
                "-t",
                "tmux new-session -A -s main",
            ]
        );
    }

    #[test]
    fn test_ssh_args_plain_shell() {
        let args = ssh_args(&info(), None);
        assert_eq!(args.last().map(String::as_str), Some("dev@sc.example.com"));
        assert!(!args.contains(&"-t".to_string()));
    }

    #[tokio::test]
    async fn test_wait_for_port_when_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        wait_for_port(
            &addr,
            Duration::from_secs(2),
            Duration::from_millis(10),
            Duration::from_millis(200),
            || {},
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_port_times_out() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let retries = Cell::new(0);
        let err = wait_for_port(
            &addr,
            Duration::from_millis(100),
            Duration::from_millis(20),
            Duration::from_millis(50),
            || retries.set(retries.get() + 1),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("timeout waiting for SSH"));
        assert!(retries.get() >= 1);
    }
}
