//! The create step of an upload.
//!
//! [`UploadNegotiator::create_upload`] sends one create request for a file or
//! folder and tells the caller what is left to do: nothing (folder, or the
//! service already had the content) or a list of chunk targets.
//!
//! Responses are classified in two stages. A body carrying the common error
//! envelope becomes [`NegotiationError::Service`] and is never decoded as a
//! create result; anything else must decode as one or it is a
//! [`NegotiationError::Decode`].

use bytes::Bytes;
use log::{debug, warn};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use serde_json::Value;
use url::Url;

use crate::config::NegotiatorConfig;
use crate::data::{UploadCreateOutcome, UploadIntent};
use crate::error::{ConfigError, NegotiationError};
use crate::payloads::{ApiErrorPayload, CreateRequest, CreateResponse};
use crate::transport::{ReqwestTransport, Transport};

/// Relative to the configured base URL.
pub const CREATE_PATH: &str = "adrive/v1.0/openFile/create";

/// Holds no per-call state, so one negotiator can serve concurrent creates.
pub struct UploadNegotiator<T> {
    transport: T,
    endpoint: Url,
    authorization: HeaderValue,
}

impl UploadNegotiator<ReqwestTransport> {
    pub fn from_config(config: &NegotiatorConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(config)?;
        Self::new(config, transport)
    }
}

impl<T: Transport> UploadNegotiator<T> {
    pub fn new(config: &NegotiatorConfig, transport: T) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(&config.base_url)
            .and_then(|mut base| {
                // Keep any path prefix on the base, as in `https://proxy/api`.
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                base.join(CREATE_PATH)
            })
            .map_err(|source| ConfigError::InvalidBaseUrl {
                url: config.base_url.clone(),
                source,
            })?;
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", config.access_token))
            .map_err(|_| ConfigError::InvalidAccessToken)?;
        authorization.set_sensitive(true);
        Ok(Self {
            transport,
            endpoint,
            authorization,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.authorization.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Creates the file or folder described by `intent`.
    ///
    /// Exactly one request is sent. Nothing is retried and no timeout is
    /// added beyond what the transport enforces.
    pub async fn create_upload(
        &self,
        intent: &UploadIntent,
    ) -> Result<UploadCreateOutcome, NegotiationError> {
        let result = self.negotiate(intent).await;
        if let Err(e) = &result {
            log_failure(intent, e);
        }
        result
    }

    async fn negotiate(&self, intent: &UploadIntent) -> Result<UploadCreateOutcome, NegotiationError> {
        let request = CreateRequest::from(intent);
        let body = serde_json::to_vec(&request)
            .map_err(|e| NegotiationError::Transport(format!("could not encode request: {e}")))?;
        debug!(
            "do request url: {} (create {:?} under {})",
            self.endpoint,
            intent.name(),
            intent.parent_id()
        );

        let raw = self
            .transport
            .execute(Method::POST, &self.endpoint, Bytes::from(body), self.headers())
            .await?;

        let response = classify_response(&raw)?;
        let outcome = response.into_outcome(intent)?;
        debug!(
            "created {} as {} (rapid upload: {}, {} chunk targets)",
            intent.name(),
            outcome.entry_id,
            outcome.rapid_upload_accepted,
            outcome.chunk_targets.len()
        );
        Ok(outcome)
    }
}

/// Sorts a raw create response into error envelope or create result.
///
/// A body that is not JSON at all counts as unreadable and is reported as a
/// transport failure.
pub fn classify_response(body: &[u8]) -> Result<CreateResponse, NegotiationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| NegotiationError::Transport(format!("unreadable response: {e}")))?;
    if let Some(error) = try_parse_service_error(&value) {
        return Err(error.into());
    }
    serde_json::from_value(value).map_err(|e| NegotiationError::Decode(e.to_string()))
}

/// An object with a non-empty string `code` is an error envelope.
pub fn try_parse_service_error(value: &Value) -> Option<ApiErrorPayload> {
    match value.get("code") {
        Some(Value::String(code)) if !code.is_empty() => Some(ApiErrorPayload {
            code: code.clone(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        _ => None,
    }
}

fn log_failure(intent: &UploadIntent, e: &NegotiationError) {
    match e {
        NegotiationError::Transport(msg) => {
            warn!("file create {:?} transport error: {msg}", intent.name())
        }
        NegotiationError::Service { code, message } => {
            warn!("file create {:?} rejected ({code}): {message}", intent.name())
        }
        NegotiationError::Decode(msg) => {
            warn!("parse file create {:?} result error: {msg}", intent.name())
        }
    }
}
