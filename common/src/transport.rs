use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::{header::HeaderMap, Client, Method};
use url::Url;

use crate::config::NegotiatorConfig;
use crate::error::TransportError;

/// Executes one HTTP request and hands back the raw body.
///
/// Implementations return the body whatever the status code is, since error
/// envelopes arrive on non-2xx responses. They must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Bytes,
        headers: HeaderMap,
    ) -> Result<Bytes, TransportError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &NegotiatorConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .tcp_keepalive(Some(Duration::from_secs(30)));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Shares an existing client, and with it its connection pool.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Bytes,
        headers: HeaderMap,
    ) -> Result<Bytes, TransportError> {
        let res = self
            .client
            .request(method, url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await?;
        let status = res.status();
        let body = res.bytes().await?;
        debug!("response status {status}, {} bytes", body.len());
        Ok(body)
    }
}
