//! On-disk config shapes, oldest to newest.
//!
//! The file went through three layouts:
//!
//! - `Flat`: a single `server` / `token` pair
//! - `ServerMap`: `current_server` plus `servers` keyed by alias, each with
//!   `url`, `token` and an optional `insecure` flag
//! - `Current`: `current_server` plus a list of `servers` entries
//!
//! Each version has a pure shape predicate and a conversion into [`Config`].
//! Detection walks [`SCHEMA_VERSIONS`] in order and takes the first match.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;

use super::settings::{Config, ServerEntry, normalize_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    Current,
    ServerMap,
    Flat,
}

/// Detection order. `Current` goes first so an up-to-date file is never
/// mistaken for a legacy one.
pub const SCHEMA_VERSIONS: &[SchemaVersion] = &[
    SchemaVersion::Current,
    SchemaVersion::ServerMap,
    SchemaVersion::Flat,
];

impl SchemaVersion {
    /// Whether `doc` has the shape of this version.
    pub fn matches(self, doc: &Value) -> bool {
        let map = match doc {
            Value::Mapping(map) => map,
            Value::Null => return self == Self::Current,
            _ => return false,
        };
        let servers = map.get("servers");

        match self {
            Self::Current => match servers {
                Some(Value::Sequence(_)) | Some(Value::Null) => true,
                None => !map.contains_key("server"),
                Some(_) => false,
            },
            Self::ServerMap => matches!(servers, Some(Value::Mapping(_))),
            Self::Flat => servers.is_none() && map.get("server").is_some_and(Value::is_string),
        }
    }

    /// Convert a document already known to match this version.
    pub fn convert(self, doc: Value) -> Result<Config, serde_yaml::Error> {
        match self {
            Self::Current => {
                let mut doc = doc;
                match &mut doc {
                    Value::Null => return Ok(Config::default()),
                    Value::Mapping(map) => {
                        // `servers:` with nothing after it parses as null
                        for key in ["current_server", "servers"] {
                            if map.get(key).is_some_and(Value::is_null) {
                                map.remove(key);
                            }
                        }
                    }
                    _ => {}
                }
                serde_yaml::from_value(doc)
            }
            Self::ServerMap => serde_yaml::from_value::<ServerMapConfig>(doc).map(Config::from),
            Self::Flat => serde_yaml::from_value::<FlatConfig>(doc).map(Config::from),
        }
    }
}

/// Parse raw file contents into the current shape.
///
/// Returns the config together with the version it was stored as, so the
/// caller knows whether it must be written back.
pub fn parse(content: &str) -> Result<(Config, SchemaVersion), String> {
    if content.trim().is_empty() {
        return Ok((Config::default(), SchemaVersion::Current));
    }

    let doc: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    let version = detect(&doc).ok_or_else(|| "unrecognized config layout".to_string())?;
    let config = version.convert(doc).map_err(|e| e.to_string())?;
    check_unique(&config)?;

    Ok((config, version))
}

/// Aliases and URLs each name at most one entry.
fn check_unique(config: &Config) -> Result<(), String> {
    for (i, entry) in config.servers.iter().enumerate() {
        let earlier = &config.servers[..i];
        if !entry.alias.is_empty() && earlier.iter().any(|s| s.alias == entry.alias) {
            return Err(format!("duplicate server alias {:?}", entry.alias));
        }
        let url = normalize_url(&entry.server);
        if earlier.iter().any(|s| normalize_url(&s.server) == url) {
            return Err(format!("duplicate server URL {url:?}"));
        }
    }
    Ok(())
}

pub fn detect(doc: &Value) -> Option<SchemaVersion> {
    SCHEMA_VERSIONS.iter().copied().find(|v| v.matches(doc))
}

#[derive(Debug, Deserialize)]
struct FlatConfig {
    server: String,
    #[serde(default)]
    token: Option<String>,
}

impl From<FlatConfig> for Config {
    fn from(legacy: FlatConfig) -> Self {
        let url = normalize_url(&legacy.server);
        if url.is_empty() {
            return Self::default();
        }

        Self {
            current_server: url.clone(),
            servers: vec![ServerEntry {
                server: url,
                token: legacy.token.unwrap_or_default(),
                ..ServerEntry::default()
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerMapConfig {
    #[serde(default)]
    current_server: Option<String>,
    servers: BTreeMap<String, MapEntry>,
}

#[derive(Debug, Deserialize)]
struct MapEntry {
    url: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    insecure: bool,
}

impl From<ServerMapConfig> for Config {
    fn from(legacy: ServerMapConfig) -> Self {
        let mut current_server = legacy.current_server.unwrap_or_default();
        let mut servers: Vec<ServerEntry> = Vec::with_capacity(legacy.servers.len());

        for (alias, entry) in legacy.servers {
            let url = normalize_url(&entry.url);

            // The old layout did not enforce unique URLs; keep the first
            // alias and repoint `current_server` if it named a dropped one.
            if let Some(kept) = servers.iter().find(|s| s.server == url) {
                if current_server == alias {
                    current_server = kept.key().to_string();
                }
                continue;
            }

            servers.push(ServerEntry {
                alias,
                server: url,
                token: entry.token.unwrap_or_default(),
                insecure: entry.insecure,
            });
        }

        Self {
            current_server,
            servers,
        }
    }
}
