mod active_sandbox;
mod error;
mod schema;
mod settings;

pub use active_sandbox::{ActiveSandbox, resolve_sandbox_name};
pub use settings::{
    Config, Connection, ServerEntry, TOKEN_ENV, TokenSource, mask_token, normalize_url,
    parse_server_url,
};
