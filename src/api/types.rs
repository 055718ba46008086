use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use crossterm::style::Color;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Sandbox {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: SandboxStatus,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ssh_port: Option<u16>,
    #[serde(default)]
    pub persistent_volume: bool,
    #[serde(default)]
    pub mount_home: bool,
    #[serde(default)]
    pub tailscale: bool,
    #[serde(default)]
    pub tailscale_ip: Option<String>,
    /// Removed when the session that created it ends
    #[serde(default)]
    pub temporary: bool,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SandboxStatus {
    Pending,
    Running,
    Stopped,
    Destroyed,
    #[default]
    Unknown,
    Other(String),
}

impl FromStr for SandboxStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "destroyed" => Self::Destroyed,
            "" => Self::Unknown,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl<'de> Deserialize<'de> for SandboxStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(raw.parse().unwrap_or_default())
    }
}

impl SandboxStatus {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Destroyed => "destroyed",
            Self::Unknown => "unknown",
            Self::Other(s) => s,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Running => Color::Green,
            Self::Pending => Color::Yellow,
            Self::Stopped => Color::DarkGrey,
            Self::Destroyed => Color::Red,
            Self::Unknown | Self::Other(_) => Color::White,
        }
    }
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateSandboxRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub persistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub tailscale: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mount_home: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub temporary: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateSandboxRequest {
    pub temporary: bool,
}

/// SSH coordinates for a sandbox
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectInfo {
    pub host: String,
    pub port: u16,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub domain: String,
    pub port: u16,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteRequest {
    pub domain: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub sandbox: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreRequest {
    pub snapshot: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TailscaleEnableRequest<'a> {
    pub auth_key: &'a str,
}

/// Per-user Tailscale sidecar state
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TailscaleStatus {
    pub running: bool,
    pub network: Option<String>,
    pub tailscale_ip: Option<String>,
    pub hostname: Option<String>,
    pub tailnet: Option<String>,
    pub connected_sandboxes: u32,
    pub sandboxes: Vec<TailscaleSandbox>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TailscaleSandbox {
    pub name: String,
    #[serde(default)]
    pub ip: Option<String>,
}

/// `GET /api/info`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub version: String,
    pub rails: String,
    pub ruby: String,
    pub host: HostInfo,
    pub sandboxes: SandboxCounts,
    pub docker: DockerInfo,
    pub users: UserCounts,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostInfo {
    pub uptime: String,
    pub cpu_count: u32,
    pub load: LoadAverage,
    pub memory: Usage,
    pub disk: Usage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub used_gb: f64,
    pub total_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SandboxCounts {
    pub total: u32,
    pub running: u32,
    pub stopped: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DockerInfo {
    pub version: String,
    pub containers: u32,
    pub containers_running: u32,
    pub images: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserCounts {
    pub total: u32,
    pub admins: u32,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceCodeRequest<'a> {
    pub client_name: &'a str,
}

/// Response to a device code request; lives only for one login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceAuthSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub interval: i64,
}

#[derive(Debug, Serialize)]
pub struct DeviceTokenRequest<'a> {
    pub device_code: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct DeviceTokenResponse {
    pub token: String,
}
