//! Device authorization: trade a browser approval for a bearer token.
//!
//! ```text
//! START -> request code -> AWAITING_APPROVAL -> poll ... -> APPROVED | DENIED | EXPIRED
//! ```
//!
//! Each terminal state ends the flow exactly once. Nothing is retried: a
//! transport failure while polling aborts like any other error.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, DeviceAuthSession};

/// Substituted when the server suggests polling faster than once a second.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Substituted when the server sends no usable expiry.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(600);

const MIN_POLL_INTERVAL_SECS: i64 = 1;

/// Result of one poll of the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Approved(String),
    Pending,
    Denied(String),
}

/// The two device endpoints of the remote service.
#[async_trait]
pub trait DeviceAuthApi: Send + Sync {
    async fn request_device_code(&self, client_name: &str) -> Result<DeviceAuthSession, ApiError>;

    async fn poll_device_token(&self, device_code: &str) -> Result<PollOutcome, ApiError>;
}

/// Time source for the polling loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What the user sees while the flow runs.
pub trait LoginPrompt: Send + Sync {
    /// Show the user code and where to enter it.
    fn show_code(&self, session: &DeviceAuthSession);

    /// Best-effort attempt to open `url` locally. Returns whether it worked.
    fn open_browser(&self, url: &str) -> bool;

    fn waiting(&self);

    fn done(&self);
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("failed to request device code: {0}")]
    DeviceCode(#[source] ApiError),

    #[error("failed while waiting for approval: {0}")]
    Poll(#[source] ApiError),

    #[error("login denied: {0}")]
    Denied(String),

    #[error("device code expired before it was approved. Run 'sandcastle login' again.")]
    CodeExpired,

    #[error("login timed out after {}s waiting for approval. Run 'sandcastle login' again.", .0.as_secs())]
    TimedOut(Duration),
}

/// Drives one device authorization session.
pub struct DeviceFlow<'a, A, C, P> {
    api: &'a A,
    clock: &'a C,
    prompt: &'a P,
    open_browser: bool,
}

impl<'a, A, C, P> DeviceFlow<'a, A, C, P>
where
    A: DeviceAuthApi,
    C: Clock,
    P: LoginPrompt,
{
    pub fn new(api: &'a A, clock: &'a C, prompt: &'a P) -> Self {
        Self {
            api,
            clock,
            prompt,
            open_browser: true,
        }
    }

    pub fn open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Run the whole flow and return the issued token.
    pub async fn authorize(&self, client_name: &str) -> Result<String, LoginError> {
        let session = self
            .api
            .request_device_code(client_name)
            .await
            .map_err(LoginError::DeviceCode)?;
        info!(user_code = %session.user_code, "device code issued");

        self.prompt.show_code(&session);
        if self.open_browser && !self.prompt.open_browser(&session.verification_url) {
            debug!("could not open a browser; user must visit the URL manually");
        }

        self.prompt.waiting();
        let result = self.await_approval(&session).await;
        self.prompt.done();
        result
    }

    async fn await_approval(&self, session: &DeviceAuthSession) -> Result<String, LoginError> {
        let interval = poll_interval(session.interval);
        let expires_in = expiry(session.expires_in);
        let started = self.clock.now();
        let mut attempts = 0u32;

        loop {
            self.clock.sleep(interval).await;

            if self.clock.now().duration_since(started) >= expires_in {
                warn!(attempts, "device login timed out");
                return Err(LoginError::TimedOut(expires_in));
            }

            attempts += 1;
            match self
                .api
                .poll_device_token(&session.device_code)
                .await
                .map_err(LoginError::Poll)?
            {
                PollOutcome::Approved(token) => {
                    info!(attempts, "device login approved");
                    return Ok(token);
                }
                PollOutcome::Pending => debug!(attempts, "authorization pending"),
                PollOutcome::Denied(message) => {
                    warn!(attempts, %message, "device login rejected");
                    return Err(match message.as_str() {
                        "expired_token" => LoginError::CodeExpired,
                        _ => LoginError::Denied(message),
                    });
                }
            }
        }
    }
}

fn poll_interval(suggested_secs: i64) -> Duration {
    if suggested_secs < MIN_POLL_INTERVAL_SECS {
        DEFAULT_POLL_INTERVAL
    } else {
        Duration::from_secs(suggested_secs.unsigned_abs())
    }
}

fn expiry(suggested_secs: i64) -> Duration {
    if suggested_secs <= 0 {
        DEFAULT_EXPIRES_IN
    } else {
        Duration::from_secs(suggested_secs.unsigned_abs())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn test_approved_after_pending_polls() {
        let api = ScriptedApi::new(600, 3)
            .then(PollOutcome::Pending)
            .then(PollOutcome::Pending)
            .then(PollOutcome::Pending)
            .then(PollOutcome::Approved("sc_token".to_string()));
        let clock = ManualClock::new();
        let prompt = RecordingPrompt::default();

        let token = DeviceFlow::new(&api, &clock, &prompt)
            .authorize("laptop")
            .await
            .unwrap();

        assert_eq!(token, "sc_token");
        assert_eq!(api.poll_count(), 4);
        assert_eq!(*clock.sleeps.lock().unwrap(), vec![Duration::from_secs(3); 4]);
        assert_eq!(*prompt.shown.lock().unwrap(), vec!["ABCD-1234".to_string()]);
        assert_eq!(*api.client_names.lock().unwrap(), vec!["laptop".to_string()]);
    }

    #[tokio::test]
    async fn test_times_out_when_never_approved() {
        let api = ScriptedApi::new(2, 1);
        let clock = ManualClock::new();
        let prompt = RecordingPrompt::default();

        let err = DeviceFlow::new(&api, &clock, &prompt)
            .authorize("laptop")
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::TimedOut(d) if d == Duration::from_secs(2)));
        assert_eq!(api.poll_count(), 1);
    }

    #[tokio::test]
    async fn test_denied_carries_remote_message() {
        let api = ScriptedApi::new(600, 1)
            .then(PollOutcome::Pending)
            .then(PollOutcome::Denied("access_denied".to_string()));
        let clock = ManualClock::new();
        let prompt = RecordingPrompt::default();

        let err = DeviceFlow::new(&api, &clock, &prompt)
            .authorize("laptop")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "login denied: access_denied");
        assert_eq!(api.poll_count(), 2);
    }

    #[tokio::test]
    async fn test_expired_code_has_its_own_error() {
        let api = ScriptedApi::new(600, 1).then(PollOutcome::Denied("expired_token".to_string()));
        let clock = ManualClock::new();
        let prompt = RecordingPrompt::default();

        let err = DeviceFlow::new(&api, &clock, &prompt)
            .authorize("laptop")
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::CodeExpired));
    }

    #[tokio::test]
    async fn test_poll_failure_is_not_retried() {
        let api = ScriptedApi::new(600, 1)
            .then(PollOutcome::Pending)
            .then_err(ApiError::Remote {
                status: StatusCode::BAD_GATEWAY,
                message: "upstream down".to_string(),
            })
            .then(PollOutcome::Approved("never".to_string()));
        let clock = ManualClock::new();
        let prompt = RecordingPrompt::default();

        let err = DeviceFlow::new(&api, &clock, &prompt)
            .authorize("laptop")
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::Poll(_)));
        assert_eq!(api.poll_count(), 2);
    }

    #[tokio::test]
    async fn test_interval_below_floor_uses_default() {
        let api = ScriptedApi::new(600, 0).then(PollOutcome::Approved("t".to_string()));
        let clock = ManualClock::new();
        let prompt = RecordingPrompt::default();

        DeviceFlow::new(&api, &clock, &prompt)
            .authorize("laptop")
            .await
            .unwrap();

        assert_eq!(*clock.sleeps.lock().unwrap(), vec![DEFAULT_POLL_INTERVAL]);
    }

    #[tokio::test]
    async fn test_browser_is_optional() {
        let api = ScriptedApi::new(600, 1).then(PollOutcome::Approved("t".to_string()));
        let clock = ManualClock::new();
        let prompt = RecordingPrompt::default();

        // Browser launch "fails" (browser_works = false) and the flow still completes
        DeviceFlow::new(&api, &clock, &prompt)
            .authorize("laptop")
            .await
            .unwrap();
        assert_eq!(prompt.opened.lock().unwrap().len(), 1);

        let api = ScriptedApi::new(600, 1).then(PollOutcome::Approved("t".to_string()));
        let prompt = RecordingPrompt::default();
        DeviceFlow::new(&api, &clock, &prompt)
            .open_browser(false)
            .authorize("laptop")
            .await
            .unwrap();
        assert!(prompt.opened.lock().unwrap().is_empty());
    }

    #[test]
    fn test_poll_interval_and_expiry_defaults() {
        assert_eq!(poll_interval(-3), DEFAULT_POLL_INTERVAL);
        assert_eq!(poll_interval(0), DEFAULT_POLL_INTERVAL);
        assert_eq!(poll_interval(1), Duration::from_secs(1));
        assert_eq!(poll_interval(3), Duration::from_secs(3));
        assert_eq!(expiry(0), DEFAULT_EXPIRES_IN);
        assert_eq!(expiry(120), Duration::from_secs(120));
    }
}
