mod client;
mod error;
mod types;

pub use client::SandcastleClient;
pub use error::ApiError;
pub use types::*;
