use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sandcastle")]
#[command(author, version, about = "CLI for managing Sandcastle sandboxes")]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to a server through the browser
    Login {
        /// Server URL (https:// is assumed when no scheme is given)
        url: String,
        /// Alias to store the server under (derived from the URL by default)
        alias: Option<String>,
        /// Print the approval link instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Manage server connections
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
    /// Inspect CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List all sandboxes
    #[command(visible_alias = "ls")]
    List,
    /// Create a new sandbox
    Create(CreateArgs),
    /// Delete a sandbox
    Delete { name: String },
    /// Start a stopped sandbox
    Start { name: String },
    /// Stop a running sandbox
    Stop { name: String },
    /// Mark a sandbox as temporary (removed on exit) or kept
    Set { name: String, mode: Lifetime },
    /// SSH into a sandbox and attach tmux (starts it if stopped)
    Connect { name: Option<String> },
    /// SSH into a sandbox shell without tmux
    Ssh { name: Option<String> },
    /// Run a single command in a sandbox: exec <name> -- <command...>
    Exec {
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        args: Vec<String>,
    },
    /// Show or set the active sandbox for this directory
    Use { name: Option<String> },
    /// Manage custom domain routes for a sandbox
    Route {
        #[command(subcommand)]
        action: RouteAction,
    },
    /// Manage sandbox snapshots
    #[command(visible_alias = "snap")]
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Manage API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Manage the Tailscale auth key for your sandboxes
    #[command(visible_alias = "ts")]
    Tailscale {
        #[command(subcommand)]
        action: TailscaleAction,
    },
    /// Show system status
    Status,
    /// Show server information
    Info,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Lifetime {
    /// Removed when the session that created it exits
    Temp,
    /// Never removed automatically
    Keep,
}

#[derive(Args)]
pub struct CreateArgs {
    pub name: String,
    /// Container image
    #[arg(long)]
    pub image: Option<String>,
    /// Enable persistent volume
    #[arg(long)]
    pub persistent: bool,
    /// Create from snapshot
    #[arg(long)]
    pub snapshot: Option<String>,
    /// Connect to the Tailscale network
    #[arg(long)]
    pub tailscale: bool,
    /// Mount persistent home directory
    #[arg(long, env = "SANDCASTLE_HOME", value_parser = FalseyValueParser::new())]
    pub home: bool,
    /// Mount user data directory (or a subpath of it) to /data
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = ".",
        env = "SANDCASTLE_DATA"
    )]
    pub data: Option<String>,
    /// Delete the sandbox when the session ends
    #[arg(long = "rm", env = "SANDCASTLE_RM", value_parser = FalseyValueParser::new())]
    pub remove: bool,
    /// Don't connect after creation
    #[arg(short = 'n', long)]
    pub no_connect: bool,
}

#[derive(Subcommand)]
pub enum ServerAction {
    /// Add a server
    Add {
        url: String,
        /// Human-friendly alias for this server
        #[arg(short, long)]
        alias: Option<String>,
        /// Accept invalid TLS certificates
        #[arg(long)]
        insecure: bool,
    },
    /// List all servers
    #[command(visible_alias = "ls")]
    List,
    /// Switch the current server
    Use {
        #[arg(value_name = "ALIAS_OR_URL")]
        server: String,
    },
    /// Remove a server
    #[command(visible_alias = "rm")]
    Remove {
        #[arg(value_name = "ALIAS_OR_URL")]
        server: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
}

#[derive(Subcommand)]
pub enum RouteAction {
    /// Add a custom domain route
    Add {
        sandbox: String,
        domain: String,
        #[arg(default_value_t = 8080)]
        port: u16,
    },
    /// List all routes for a sandbox
    List { sandbox: String },
    /// Remove a custom domain route
    Delete { sandbox: String, domain: String },
}

#[derive(Subcommand)]
pub enum SnapshotAction {
    /// Create a snapshot of a sandbox
    Create {
        sandbox: String,
        name: Option<String>,
    },
    /// List all snapshots
    #[command(visible_alias = "ls")]
    List,
    /// Destroy a snapshot
    Destroy { name: String },
    /// Restore a sandbox from a snapshot
    Restore { sandbox: String, snapshot: String },
}

#[derive(Subcommand)]
pub enum TailscaleAction {
    /// Store a reusable Tailscale auth key
    Enable {
        /// Auth key (tskey-auth-...); prompted for when omitted
        #[arg(long)]
        auth_key: Option<String>,
    },
    /// Remove the stored auth key
    Disable,
    /// Show the Tailscale sidecar state
    Status,
}

#[derive(Subcommand)]
pub enum TokenAction {
    /// List all API tokens
    List,
    /// Revoke an API token
    Revoke { id: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login_with_alias() {
        let cli = Cli::try_parse_from(["sandcastle", "login", "sc.example.com", "work"]).unwrap();
        match cli.command {
            Commands::Login {
                url,
                alias,
                no_browser,
            } => {
                assert_eq!(url, "sc.example.com");
                assert_eq!(alias.as_deref(), Some("work"));
                assert!(!no_browser);
            }
            _ => panic!("expected login"),
        }
    }

    #[test]
    fn test_parse_create_data_without_path() {
        let cli = Cli::try_parse_from(["sandcastle", "create", "devbox", "--data", "--home"]).unwrap();
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.data.as_deref(), Some("."));
                assert!(args.home);
                assert!(!args.no_connect);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_parse_exec_keeps_command_flags() {
        let cli = Cli::try_parse_from(["sandcastle", "exec", "devbox", "--", "ls", "-la"]).unwrap();
        match cli.command {
            Commands::Exec { args } => {
                assert_eq!(args.first().map(String::as_str), Some("devbox"));
                assert_eq!(args.last().map(String::as_str), Some("-la"));
            }
            _ => panic!("expected exec"),
        }
    }

    #[test]
    fn test_parse_route_default_port() {
        let cli =
            Cli::try_parse_from(["sandcastle", "route", "add", "devbox", "app.example.com"]).unwrap();
        match cli.command {
            Commands::Route {
                action: RouteAction::Add { port, .. },
            } => assert_eq!(port, 8080),
            _ => panic!("expected route add"),
        }
    }

    #[test]
    fn test_parse_create_rm() {
        let cli = Cli::try_parse_from(["sandcastle", "create", "scratch", "--rm", "-n"]).unwrap();
        match cli.command {
            Commands::Create(args) => {
                assert!(args.remove);
                assert!(args.no_connect);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_parse_set_lifetime() {
        let cli = Cli::try_parse_from(["sandcastle", "set", "devbox", "keep"]).unwrap();
        match cli.command {
            Commands::Set { name, mode } => {
                assert_eq!(name, "devbox");
                assert_eq!(mode, Lifetime::Keep);
            }
            _ => panic!("expected set"),
        }
        assert!(Cli::try_parse_from(["sandcastle", "set", "devbox", "forever"]).is_err());
    }

    #[test]
    fn test_parse_tailscale_enable_key() {
        let cli = Cli::try_parse_from(["sandcastle", "ts", "enable", "--auth-key", "tskey-auth-1"])
            .unwrap();
        match cli.command {
            Commands::Tailscale {
                action: TailscaleAction::Enable { auth_key },
            } => assert_eq!(auth_key.as_deref(), Some("tskey-auth-1")),
            _ => panic!("expected tailscale enable"),
        }
    }

    #[test]
    fn test_aliases() {
        assert!(Cli::try_parse_from(["sandcastle", "ls"]).is_ok());
        assert!(Cli::try_parse_from(["sandcastle", "server", "rm", "prod"]).is_ok());
        assert!(Cli::try_parse_from(["sandcastle", "snap", "ls"]).is_ok());
        assert!(Cli::try_parse_from(["sandcastle", "info"]).is_ok());
    }
}
