use std::time::Duration;

pub const OPENAPI_URL: &str = "https://openapi.alipan.com";
pub const DEFAULT_USER_AGENT: &str = concat!("driveup/", env!("CARGO_PKG_VERSION"));

/// Settings for an [`UploadNegotiator`](crate::negotiator::UploadNegotiator).
///
/// `timeout` is only applied by transports that honour it; the negotiator
/// itself never times out a request.
#[derive(Clone, Debug)]
pub struct NegotiatorConfig {
    pub base_url: String,
    pub access_token: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
}

impl NegotiatorConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: OPENAPI_URL.to_string(),
            access_token: access_token.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
