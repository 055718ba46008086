use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid server URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// DNS, connect, TLS or timeout failure before a response arrived
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-2xx response. `message` is the body's `error` field when present.
    #[error("API error ({status}): {message}")]
    Remote { status: StatusCode, message: String },

    #[error("failed to parse {what} response: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
