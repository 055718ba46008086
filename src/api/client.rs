use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ApiError;
use super::types::*;
use crate::auth::{DeviceAuthApi, PollOutcome};
use crate::config::Connection;

#[derive(Clone)]
pub struct SandcastleClient {
    client: Client,
    base: Url,
    base_url: String,
    token: Option<String>,
}

impl SandcastleClient {
    /// Authenticated client for a configured server.
    pub fn new(connection: &Connection) -> Result<Self, ApiError> {
        Self::build(&connection.url, Some(&connection.token), connection.insecure)
    }

    /// Client without credentials, used for the device login endpoints.
    pub fn anonymous(base_url: &str, insecure: bool) -> Result<Self, ApiError> {
        Self::build(base_url, None, insecure)
    }

    fn build(base_url: &str, token: Option<&str>, insecure: bool) -> Result<Self, ApiError> {
        // Normalize the base URL (remove trailing slash)
        let base_url = base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl {
                url: base_url,
                reason: "not a server address".to_string(),
            });
        }

        let client = Client::builder()
            .user_agent(concat!("sandcastle-cli/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            client,
            base,
            base_url,
            token: token.map(str::to_string),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, %url, "api request");

        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(ApiError::Transport)?;
        debug!(status = %response.status(), "api response");
        Ok(response)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&(impl Serialize + Sync)>,
        what: &'static str,
    ) -> Result<T, ApiError> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = self.send(builder).await?;
        if !response.status().is_success() {
            return Err(extract_api_error(response).await);
        }

        let bytes = response.bytes().await.map_err(ApiError::Transport)?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode { what, source })
    }

    /// Like `call` but ignores the response body.
    async fn call_empty(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<(), ApiError> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = self.send(builder).await?;
        if !response.status().is_success() {
            return Err(extract_api_error(response).await);
        }
        Ok(())
    }

    // Sandboxes

    pub async fn list_sandboxes(&self) -> Result<Vec<Sandbox>, ApiError> {
        self.call(Method::GET, &["api", "sandboxes"], None::<&()>, "sandbox list")
            .await
    }

    pub async fn get_sandbox(&self, id: u64) -> Result<Sandbox, ApiError> {
        self.call(
            Method::GET,
            &["api", "sandboxes", &id.to_string()],
            None::<&()>,
            "sandbox",
        )
        .await
    }

    pub async fn create_sandbox(&self, req: &CreateSandboxRequest) -> Result<Sandbox, ApiError> {
        self.call(Method::POST, &["api", "sandboxes"], Some(req), "sandbox")
            .await
    }

    pub async fn update_sandbox(
        &self,
        id: u64,
        req: &UpdateSandboxRequest,
    ) -> Result<Sandbox, ApiError> {
        self.call(
            Method::PATCH,
            &["api", "sandboxes", &id.to_string()],
            Some(req),
            "sandbox",
        )
        .await
    }

    pub async fn destroy_sandbox(&self, id: u64) -> Result<(), ApiError> {
        self.call_empty(Method::DELETE, &["api", "sandboxes", &id.to_string()], None::<&()>)
            .await
    }

    pub async fn start_sandbox(&self, id: u64) -> Result<Sandbox, ApiError> {
        self.call(
            Method::POST,
            &["api", "sandboxes", &id.to_string(), "start"],
            None::<&()>,
            "sandbox",
        )
        .await
    }

    pub async fn stop_sandbox(&self, id: u64) -> Result<Sandbox, ApiError> {
        self.call(
            Method::POST,
            &["api", "sandboxes", &id.to_string(), "stop"],
            None::<&()>,
            "sandbox",
        )
        .await
    }

    pub async fn connect_info(&self, id: u64) -> Result<ConnectInfo, ApiError> {
        self.call(
            Method::POST,
            &["api", "sandboxes", &id.to_string(), "connect"],
            None::<&()>,
            "connect info",
        )
        .await
    }

    // Routes

    pub async fn list_routes(&self, sandbox_id: u64) -> Result<Vec<Route>, ApiError> {
        self.call(
            Method::GET,
            &["api", "sandboxes", &sandbox_id.to_string(), "routes"],
            None::<&()>,
            "route list",
        )
        .await
    }

    pub async fn add_route(&self, sandbox_id: u64, req: &RouteRequest) -> Result<Route, ApiError> {
        self.call(
            Method::POST,
            &["api", "sandboxes", &sandbox_id.to_string(), "routes"],
            Some(req),
            "route",
        )
        .await
    }

    pub async fn remove_route(&self, sandbox_id: u64, domain: &str) -> Result<(), ApiError> {
        self.call_empty(
            Method::DELETE,
            &["api", "sandboxes", &sandbox_id.to_string(), "routes", domain],
            None::<&()>,
        )
        .await
    }

    // Snapshots

    pub async fn snapshot_sandbox(
        &self,
        sandbox_id: u64,
        name: Option<String>,
    ) -> Result<Snapshot, ApiError> {
        self.call(
            Method::POST,
            &["api", "sandboxes", &sandbox_id.to_string(), "snapshot"],
            Some(&SnapshotRequest { name }),
            "snapshot",
        )
        .await
    }

    pub async fn restore_sandbox(&self, sandbox_id: u64, snapshot: &str) -> Result<Sandbox, ApiError> {
        let req = RestoreRequest {
            snapshot: snapshot.to_string(),
        };
        self.call(
            Method::POST,
            &["api", "sandboxes", &sandbox_id.to_string(), "restore"],
            Some(&req),
            "sandbox",
        )
        .await
    }

    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>, ApiError> {
        self.call(Method::GET, &["api", "snapshots"], None::<&()>, "snapshot list")
            .await
    }

    pub async fn destroy_snapshot(&self, name: &str) -> Result<(), ApiError> {
        self.call_empty(Method::DELETE, &["api", "snapshots", name], None::<&()>)
            .await
    }

    // Tokens

    pub async fn list_tokens(&self) -> Result<Vec<Token>, ApiError> {
        self.call(Method::GET, &["api", "tokens"], None::<&()>, "token list")
            .await
    }

    pub async fn destroy_token(&self, id: u64) -> Result<(), ApiError> {
        self.call_empty(Method::DELETE, &["api", "tokens", &id.to_string()], None::<&()>)
            .await
    }

    // Tailscale

    pub async fn tailscale_enable(&self, auth_key: &str) -> Result<(), ApiError> {
        self.call_empty(
            Method::POST,
            &["api", "tailscale", "enable"],
            Some(&TailscaleEnableRequest { auth_key }),
        )
        .await
    }

    pub async fn tailscale_disable(&self) -> Result<(), ApiError> {
        self.call_empty(Method::DELETE, &["api", "tailscale", "disable"], None::<&()>)
            .await
    }

    pub async fn tailscale_status(&self) -> Result<TailscaleStatus, ApiError> {
        self.call(
            Method::GET,
            &["api", "tailscale", "status"],
            None::<&()>,
            "tailscale status",
        )
        .await
    }

    // Server

    pub async fn status(&self) -> Result<serde_json::Value, ApiError> {
        self.call(Method::GET, &["api", "status"], None::<&()>, "status")
            .await
    }

    pub async fn info(&self) -> Result<ServerInfo, ApiError> {
        self.call(Method::GET, &["api", "info"], None::<&()>, "server info")
            .await
    }
}

#[async_trait]
impl DeviceAuthApi for SandcastleClient {
    async fn request_device_code(&self, client_name: &str) -> Result<DeviceAuthSession, ApiError> {
        self.call(
            Method::POST,
            &["api", "auth", "device_code"],
            Some(&DeviceCodeRequest { client_name }),
            "device code",
        )
        .await
    }

    async fn poll_device_token(&self, device_code: &str) -> Result<PollOutcome, ApiError> {
        let builder = self
            .request(Method::POST, &["api", "auth", "device_token"])
            .json(&DeviceTokenRequest { device_code });
        let response = self.send(builder).await?;

        match response.status() {
            StatusCode::OK => {
                let bytes = response.bytes().await.map_err(ApiError::Transport)?;
                let body: DeviceTokenResponse = serde_json::from_slice(&bytes)
                    .map_err(|source| ApiError::Decode {
                        what: "device token",
                        source,
                    })?;
                Ok(PollOutcome::Approved(body.token))
            }
            StatusCode::PRECONDITION_REQUIRED => Ok(PollOutcome::Pending),
            _ => match extract_api_error(response).await {
                ApiError::Remote { message, .. } => Ok(PollOutcome::Denied(message)),
                other => Err(other),
            },
        }
    }
}

/// Turn a non-2xx response into `ApiError::Remote`, preferring the body's
/// `error` field over the raw text.
async fn extract_api_error(response: Response) -> ApiError {
    let status = response.status();

    let body = match response.text().await {
        Ok(t) => t,
        Err(e) => return ApiError::Transport(e),
    };

    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .map(|b| b.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });

    ApiError::Remote { status, message }
}
