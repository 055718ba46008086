use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::ConfigError;
use super::schema::{self, SchemaVersion};

/// Overrides the stored token for the current server.
pub const TOKEN_ENV: &str = "SANDCASTLE_TOKEN";

/// Overrides the config directory (default `~/.sandcastle`).
pub const CONFIG_DIR_ENV: &str = "SANDCASTLE_CONFIG_DIR";

const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Env,
    Config,
    Missing,
    InvalidEnvWhitespace,
    InvalidConfigWhitespace,
}

enum TokenResolution {
    Valid { source: TokenSource, token: String },
    Missing,
    InvalidEnvWhitespace,
    InvalidConfigWhitespace,
}

/// One remembered server connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,
    pub server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Accept invalid TLS certificates for this server
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ServerEntry {
    pub fn new(alias: impl Into<String>, url: &str) -> Self {
        Self {
            alias: alias.into(),
            server: normalize_url(url),
            ..Self::default()
        }
    }

    /// The identifier `current_server` uses for this entry.
    pub fn key(&self) -> &str {
        if self.alias.is_empty() {
            &self.server
        } else {
            &self.alias
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_server: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerEntry>,
}

/// Everything needed to build an authenticated API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub url: String,
    pub token: String,
    pub insecure: bool,
}

impl Config {
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
            && !dir.trim().is_empty()
        {
            return Ok(PathBuf::from(dir));
        }

        let dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
        Ok(dirs.home_dir().join(".sandcastle"))
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Read the config at `path`. A missing file is an empty config; a
    /// legacy layout is converted and written back before returning.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, starting empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let (config, version) = schema::parse(&content).map_err(|reason| ConfigError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;

        if version != SchemaVersion::Current {
            info!(?version, path = %path.display(), "migrating legacy config layout");
            config.save_to(path)?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Write to a sibling temp file with owner-only permissions, then rename
    /// over `path`. Readers never see a half-written file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_private_dir(parent).map_err(write_err)?;
        }

        let content = serde_yaml::to_string(self)?;
        let tmp_path = path.with_extension("yaml.tmp");

        if let Err(source) = write_private(&tmp_path, content.as_bytes()) {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_err(source));
        }
        if let Err(source) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_err(source));
        }

        debug!(path = %path.display(), servers = self.servers.len(), "config saved");
        Ok(())
    }

    /// The entry `current_server` points at. A dangling pointer reads as none.
    pub fn current(&self) -> Option<&ServerEntry> {
        if self.current_server.is_empty() {
            return None;
        }
        self.find_server(&self.current_server)
    }

    pub fn is_current(&self, entry: &ServerEntry) -> bool {
        self.current()
            .is_some_and(|current| current.server == entry.server)
    }

    /// Look up by alias first, then by URL.
    pub fn find_server(&self, alias_or_url: &str) -> Option<&ServerEntry> {
        self.position(alias_or_url).map(|i| &self.servers[i])
    }

    fn position(&self, alias_or_url: &str) -> Option<usize> {
        self.servers
            .iter()
            .position(|s| !s.alias.is_empty() && s.alias == alias_or_url)
            .or_else(|| self.servers.iter().position(|s| s.server == alias_or_url))
    }

    /// Append a new entry. The first entry ever added becomes current.
    pub fn add_server(&mut self, mut entry: ServerEntry) -> Result<(), ConfigError> {
        entry.server = normalize_url(&entry.server);

        if !entry.alias.is_empty() && self.servers.iter().any(|s| s.alias == entry.alias) {
            return Err(ConfigError::DuplicateAlias(entry.alias));
        }
        if self.servers.iter().any(|s| s.server == entry.server) {
            return Err(ConfigError::DuplicateUrl(entry.server));
        }

        if self.servers.is_empty() {
            self.current_server = entry.key().to_string();
        }
        self.servers.push(entry);
        Ok(())
    }

    /// Delete an entry. Removing the current server leaves no server current.
    pub fn remove_server(&mut self, alias_or_url: &str) -> Result<ServerEntry, ConfigError> {
        let index = self
            .position(alias_or_url)
            .ok_or_else(|| ConfigError::ServerNotFound(alias_or_url.to_string()))?;

        let was_current = self
            .current()
            .is_some_and(|c| c.server == self.servers[index].server);
        let removed = self.servers.remove(index);

        if was_current {
            self.current_server.clear();
        }

        Ok(removed)
    }

    /// Point `current_server` at an existing entry.
    pub fn use_server(&mut self, alias_or_url: &str) -> Result<&ServerEntry, ConfigError> {
        let index = self
            .position(alias_or_url)
            .ok_or_else(|| ConfigError::ServerNotFound(alias_or_url.to_string()))?;

        self.current_server = self.servers[index].key().to_string();
        Ok(&self.servers[index])
    }

    /// Create or update the entry for `alias` (or for `url` when no alias is
    /// given) and make it current. Other entries that would then share its
    /// alias or URL are dropped.
    pub fn set_server(&mut self, alias: &str, url: &str, token: &str) -> &ServerEntry {
        let url = normalize_url(url);

        let existing = if alias.is_empty() {
            None
        } else {
            self.servers.iter().position(|s| s.alias == alias)
        }
        .or_else(|| self.servers.iter().position(|s| s.server == url));

        let index = match existing {
            Some(index) => {
                let entry = &mut self.servers[index];
                if !alias.is_empty() {
                    entry.alias = alias.to_string();
                }
                // TLS trust belongs to the host, not the alias
                if entry.server != url {
                    entry.insecure = false;
                }
                entry.server = url;
                entry.token = token.to_string();
                index
            }
            None => {
                self.servers.push(ServerEntry {
                    alias: alias.to_string(),
                    server: url,
                    token: token.to_string(),
                    insecure: false,
                });
                self.servers.len() - 1
            }
        };

        let kept = self.servers[index].clone();
        let mut i = 0;
        let mut kept_index = index;
        self.servers.retain(|s| {
            let keep = i == index
                || (s.server != kept.server && (kept.alias.is_empty() || s.alias != kept.alias));
            if !keep && i < index {
                kept_index -= 1;
            }
            i += 1;
            keep
        });

        self.current_server = kept.key().to_string();
        &self.servers[kept_index]
    }

    pub fn connection(&self) -> Result<Connection, ConfigError> {
        self.resolve_connection(std::env::var(TOKEN_ENV).ok())
    }

    pub fn token_source(&self) -> TokenSource {
        self.resolve_token_source(std::env::var(TOKEN_ENV).ok())
    }

    /// Helper for tests to abstract env::var(TOKEN_ENV)
    fn resolve_connection(&self, env_token: Option<String>) -> Result<Connection, ConfigError> {
        let entry = self.current().ok_or(ConfigError::NoCurrentServer)?;

        match resolve_token(entry, env_token) {
            TokenResolution::Valid { token, .. } => Ok(Connection {
                url: entry.server.clone(),
                token,
                insecure: entry.insecure,
            }),
            TokenResolution::Missing => Err(ConfigError::NotLoggedIn {
                url: entry.server.clone(),
            }),
            TokenResolution::InvalidEnvWhitespace => Err(ConfigError::InvalidToken(format!(
                "{TOKEN_ENV} is set but empty/whitespace. Set a valid token or unset {TOKEN_ENV} to use the stored one."
            ))),
            TokenResolution::InvalidConfigWhitespace => Err(ConfigError::InvalidToken(format!(
                "Stored token for {} is empty/whitespace. Run 'sandcastle login {}' again.",
                entry.key(),
                entry.server
            ))),
        }
    }

    fn resolve_token_source(&self, env_token: Option<String>) -> TokenSource {
        let Some(entry) = self.current() else {
            return TokenSource::Missing;
        };

        match resolve_token(entry, env_token) {
            TokenResolution::Valid { source, .. } => source,
            TokenResolution::Missing => TokenSource::Missing,
            TokenResolution::InvalidEnvWhitespace => TokenSource::InvalidEnvWhitespace,
            TokenResolution::InvalidConfigWhitespace => TokenSource::InvalidConfigWhitespace,
        }
    }
}

fn resolve_token(entry: &ServerEntry, env_token: Option<String>) -> TokenResolution {
    if let Some(token) = env_token {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return TokenResolution::InvalidEnvWhitespace;
        }
        return TokenResolution::Valid {
            source: TokenSource::Env,
            token: trimmed.to_string(),
        };
    }

    if entry.token.is_empty() {
        return TokenResolution::Missing;
    }

    let trimmed = entry.token.trim();
    if trimmed.is_empty() {
        return TokenResolution::InvalidConfigWhitespace;
    }
    TokenResolution::Valid {
        source: TokenSource::Config,
        token: trimmed.to_string(),
    }
}

/// Display form of a token that never reveals all of it.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "(not set)".to_string();
    }
    match token.char_indices().nth(12) {
        Some((cut, _)) => format!("{}...", &token[..cut]),
        None => "(set)".to_string(),
    }
}

/// Trim trailing slashes and surrounding whitespace.
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Normalize user input into a server base URL, defaulting to https.
pub fn parse_server_url(input: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidUrl {
        url: input.to_string(),
        reason: reason.to_string(),
    };

    // Scheme detection runs before slash trimming so "http://" stays a bare scheme
    let raw = input.trim();
    if normalize_url(raw).is_empty() {
        return Err(invalid("empty URL"));
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let parsed = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }

    Ok(normalize_url(&candidate))
}

fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // A pre-existing temp file keeps its old mode; reset it
    restrict_permissions(path, 0o600)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn create_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder.create(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(alias: &str, url: &str, token: &str) -> ServerEntry {
        ServerEntry {
            token: token.to_string(),
            ..ServerEntry::new(alias, url)
        }
    }

    fn sample() -> Config {
        let mut config = Config::default();
        config
            .add_server(entry("prod", "https://prod.example.com", "tok-prod"))
            .unwrap();
        config
            .add_server(entry("staging", "https://staging.example.com", "tok-staging"))
            .unwrap();
        config
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token(""), "(not set)");
        assert_eq!(mask_token("short"), "(set)");
        assert_eq!(mask_token("abcdefghijkl"), "(set)");
        assert_eq!(mask_token("abcdefghijklmnopqrstuvwxyz"), "abcdefghijkl...");
    }

    #[test]
    fn test_first_added_server_becomes_current() {
        let config = sample();
        assert_eq!(config.current_server, "prod");
        assert_eq!(config.current().unwrap().server, "https://prod.example.com");
    }

    #[test]
    fn test_add_server_without_alias_uses_url_as_current() {
        let mut config = Config::default();
        config
            .add_server(ServerEntry::new("", "https://sc.example.com/"))
            .unwrap();
        assert_eq!(config.current_server, "https://sc.example.com");
    }

    #[test]
    fn test_add_server_rejects_duplicates_without_mutating() {
        let mut config = sample();
        let before = config.clone();

        let err = config
            .add_server(entry("prod", "https://other.example.com", ""))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAlias(a) if a == "prod"));
        assert_eq!(config, before);

        let err = config
            .add_server(entry("other", "https://prod.example.com/", ""))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateUrl(u) if u == "https://prod.example.com"));
        assert_eq!(config, before);
    }

    #[test]
    fn test_add_server_allows_multiple_empty_aliases() {
        let mut config = Config::default();
        config.add_server(ServerEntry::new("", "https://a.example.com")).unwrap();
        config.add_server(ServerEntry::new("", "https://b.example.com")).unwrap();
        assert_eq!(config.servers.len(), 2);
    }

    #[test]
    fn test_remove_current_server_clears_pointer() {
        let mut config = sample();
        let removed = config.remove_server("prod").unwrap();

        assert_eq!(removed.alias, "prod");
        assert_eq!(config.current_server, "");
        assert!(config.current().is_none());
        assert_eq!(config.servers.len(), 1);
    }

    #[test]
    fn test_remove_current_server_by_url_clears_pointer() {
        let mut config = sample();
        config.remove_server("https://prod.example.com").unwrap();
        assert_eq!(config.current_server, "");
    }

    #[test]
    fn test_remove_other_server_keeps_pointer() {
        let mut config = sample();
        config.remove_server("staging").unwrap();

        assert_eq!(config.current_server, "prod");
        assert_eq!(config.servers.len(), 1);
    }

    #[test]
    fn test_remove_unknown_server() {
        let mut config = sample();
        let err = config.remove_server("nope").unwrap_err();
        assert!(matches!(err, ConfigError::ServerNotFound(_)));
        assert_eq!(config.servers.len(), 2);
    }

    #[test]
    fn test_find_server_prefers_alias_over_url() {
        let mut config = Config::default();
        config
            .add_server(entry("a", "https://a.example.com", ""))
            .unwrap();
        // Alias textually equal to the first entry's URL
        config
            .add_server(entry("https://a.example.com", "https://b.example.com", ""))
            .unwrap();

        let found = config.find_server("https://a.example.com").unwrap();
        assert_eq!(found.server, "https://b.example.com");

        let found = config.find_server("a").unwrap();
        assert_eq!(found.server, "https://a.example.com");
        assert!(config.find_server("missing").is_none());
    }

    #[test]
    fn test_dangling_current_reads_as_none() {
        let mut config = sample();
        config.current_server = "gone".to_string();
        assert!(config.current().is_none());
        assert!(matches!(
            config.resolve_connection(None),
            Err(ConfigError::NoCurrentServer)
        ));
    }

    #[test]
    fn test_use_server() {
        let mut config = sample();
        let entry = config.use_server("https://staging.example.com").unwrap();
        assert_eq!(entry.alias, "staging");
        assert_eq!(config.current_server, "staging");
        assert!(config.use_server("nope").is_err());
    }

    #[test]
    fn test_set_server_creates_and_selects() {
        let mut config = sample();
        let entry = config.set_server("dev", "http://localhost:3000/", "tok-dev").clone();

        assert_eq!(entry.server, "http://localhost:3000");
        assert_eq!(entry.token, "tok-dev");
        assert_eq!(config.current_server, "dev");
        assert_eq!(config.servers.len(), 3);
    }

    #[test]
    fn test_set_server_updates_existing_alias() {
        let mut config = sample();
        config.set_server("staging", "https://staging2.example.com", "new-token");

        assert_eq!(config.servers.len(), 2);
        let staging = config.find_server("staging").unwrap();
        assert_eq!(staging.server, "https://staging2.example.com");
        assert_eq!(staging.token, "new-token");
        assert_eq!(config.current_server, "staging");
    }

    #[test]
    fn test_set_server_fills_alias_on_url_match() {
        let mut config = Config::default();
        config
            .add_server(ServerEntry::new("", "https://sc.example.com"))
            .unwrap();
        config.set_server("sc", "https://sc.example.com", "tok");

        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].alias, "sc");
        assert_eq!(config.current_server, "sc");
    }

    #[test]
    fn test_set_server_clears_insecure_when_url_changes() {
        let mut config = Config::default();
        let mut lab = ServerEntry::new("sc", "https://sc.lab.local");
        lab.insecure = true;
        config.add_server(lab).unwrap();

        config.set_server("sc", "https://sc.lab.local", "tok-1");
        assert!(config.find_server("sc").unwrap().insecure);

        config.set_server("sc", "https://sc.prod.com", "tok-2");
        let entry = config.find_server("sc").unwrap();
        assert_eq!(entry.server, "https://sc.prod.com");
        assert!(!entry.insecure);
    }

    #[test]
    fn test_set_server_drops_colliding_entries() {
        let mut config = sample();
        // Re-point "prod" at staging's URL: staging's entry must go
        config.set_server("prod", "https://staging.example.com", "tok");

        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].alias, "prod");
        assert_eq!(config.servers[0].server, "https://staging.example.com");
    }

    #[test]
    fn test_token_precedence() {
        let config = sample();

        let conn = config.resolve_connection(Some("  env-token ".to_string())).unwrap();
        assert_eq!(conn.token, "env-token");
        assert_eq!(conn.url, "https://prod.example.com");

        let conn = config.resolve_connection(None).unwrap();
        assert_eq!(conn.token, "tok-prod");

        assert!(matches!(
            config.resolve_connection(Some("   ".to_string())),
            Err(ConfigError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_token_source_resolution() {
        let mut config = sample();
        assert_eq!(config.resolve_token_source(Some("x".to_string())), TokenSource::Env);
        assert_eq!(
            config.resolve_token_source(Some(" ".to_string())),
            TokenSource::InvalidEnvWhitespace
        );
        assert_eq!(config.resolve_token_source(None), TokenSource::Config);

        config.servers[0].token = "  ".to_string();
        assert_eq!(
            config.resolve_token_source(None),
            TokenSource::InvalidConfigWhitespace
        );

        config.servers[0].token.clear();
        assert_eq!(config.resolve_token_source(None), TokenSource::Missing);
        assert!(matches!(
            config.resolve_connection(None),
            Err(ConfigError::NotLoggedIn { url }) if url == "https://prod.example.com"
        ));
    }

    #[test]
    fn test_parse_server_url() {
        assert_eq!(
            parse_server_url("sc.example.com/").unwrap(),
            "https://sc.example.com"
        );
        assert_eq!(
            parse_server_url("http://localhost:3000").unwrap(),
            "http://localhost:3000"
        );
        assert!(parse_server_url("").is_err());
        assert!(parse_server_url("ftp://sc.example.com").is_err());
        assert!(parse_server_url("http://").is_err());
        assert!(parse_server_url("https:///").is_err());
        assert_eq!(
            parse_server_url("  https://sc.example.com// ").unwrap(),
            "https://sc.example.com"
        );
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "servers: 42\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Corrupt { .. }));
        // Left untouched
        assert_eq!(fs::read_to_string(&path).unwrap(), "servers: 42\n");
    }

    #[test]
    fn test_load_duplicate_alias_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "servers:\n  - alias: sc\n    server: https://a.example.com\n  - alias: sc\n    server: https://b.example.com\n",
        )
        .unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Corrupt { .. }));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = sample();
        config.servers[1].insecure = true;

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, config);
        assert!(!path.with_extension("yaml.tmp").exists());
    }

    #[test]
    fn test_saved_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config
            .add_server(entry("prod", "https://prod.example.com", "tok"))
            .unwrap();
        config.save_to(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "current_server: prod\nservers:\n- alias: prod\n  server: https://prod.example.com\n  token: tok\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_save_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sc").join("config.yaml");
        sample().save_to(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_save_to_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();

        let err = sample().save_to(&blocker.join("config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Write { .. }));
    }

    fn assert_migration_is_stable(legacy: &str) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, legacy).unwrap();

        let first = Config::load_from(&path).unwrap();
        // Migrated form was persisted immediately
        let on_disk = fs::read_to_string(&path).unwrap();
        assert_eq!(
            schema::parse(&on_disk).unwrap().1,
            SchemaVersion::Current
        );

        first.save_to(&path).unwrap();
        let second = Config::load_from(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_flat_layout_migrates_losslessly() {
        assert_migration_is_stable("server: https://sc.example.com/\ntoken: sc_0123456789abcdef\n");

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "server: https://sc.example.com\ntoken: t\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        let current = config.current().unwrap();
        assert_eq!(current.server, "https://sc.example.com");
        assert_eq!(current.token, "t");
    }

    #[test]
    fn test_map_layout_migrates_losslessly() {
        assert_migration_is_stable(
            "current_server: prod\nservers:\n  prod:\n    url: https://prod.example.com\n    token: tok\n    insecure: true\n  dev:\n    url: http://localhost:3000\n",
        );
    }

    #[test]
    fn test_current_layout_is_stable() {
        assert_migration_is_stable(
            "current_server: prod\nservers:\n- alias: prod\n  server: https://prod.example.com\n  token: tok\n",
        );
    }
}
