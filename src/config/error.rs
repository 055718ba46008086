use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Config file {} is corrupt: {reason}\n\nFix or delete the file, then run 'sandcastle login <url>' again.",
        path.display()
    )]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Alias already in use: {0}")]
    DuplicateAlias(String),

    #[error("Server already exists: {0}")]
    DuplicateUrl(String),

    #[error("Server not found: {0}\n\nRun 'sandcastle server list' to see configured servers.")]
    ServerNotFound(String),

    #[error("No server configured.\n\nRun 'sandcastle login <url>' or 'sandcastle server add <url>'.")]
    NoCurrentServer,

    #[error("Not logged in to {url}.\n\nRun 'sandcastle login {url}'.")]
    NotLoggedIn { url: String },

    #[error("{0}")]
    InvalidToken(String),

    #[error("Invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Could not determine home directory for the config file")]
    NoHomeDir,
}
