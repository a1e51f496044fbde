//! RPC transport trait and the HTTP client backed by `reqwest`.
//!
//! The client retries transient failures (connection errors, timeouts, 5xx,
//! node warm-up) with exponential backoff before surfacing an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcParam};
use crate::retry::{RetryConfig, RetryPolicy};

/// Anything that can execute a JSON-RPC call against a Bitcoin node.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Call `method` and return the raw `result` value.
    async fn call(&self, method: &str, params: Vec<RpcParam>) -> Result<Value, RpcError>;

    /// The endpoint this transport talks to (for logging).
    fn url(&self) -> &str;
}

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
    /// `rpcuser` / `rpcpassword` for HTTP basic auth.
    pub auth: Option<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
            auth: None,
        }
    }
}

/// HTTP JSON-RPC client for Bitcoin Core.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    auth: Option<(String, String)>,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a new client for the given node URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RpcError::Config(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            auth: config.auth,
            request_timeout: config.request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create with default configuration and optional credentials.
    pub fn default_for(
        url: impl Into<String>,
        auth: Option<(String, String)>,
    ) -> Result<Self, RpcError> {
        Self::new(
            url,
            HttpClientConfig {
                auth,
                ..HttpClientConfig::default()
            },
        )
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<Value, RpcError> {
        let mut builder = self.http.post(&self.url).json(req);
        if let Some((user, password)) = &self.auth {
            builder = builder.basic_auth(user, Some(password));
        }

        let resp = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;

        // Core reports RPC errors with HTTP 500 and a JSON body.
        match serde_json::from_str::<JsonRpcResponse>(&body) {
            Ok(parsed) => parsed.into_result().map_err(RpcError::Rpc),
            Err(_) if !status.is_success() => Err(RpcError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(RpcError::Deserialization(e)),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> RpcError {
        if e.is_timeout() {
            RpcError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            RpcError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn call(&self, method: &str, params: Vec<RpcParam>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(&req).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            method,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            url = %self.url,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(
                            attempt,
                            method,
                            error = %e,
                            url = %self.url,
                            "max retries exceeded"
                        );
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_credentials() {
        let client = HttpRpcClient::default_for(
            "http://127.0.0.1:8332",
            Some(("user".into(), "pass".into())),
        )
        .unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:8332");
        assert!(client.auth.is_some());
    }

    #[tokio::test]
    async fn unreachable_node_surfaces_http_error() {
        let client = HttpRpcClient::new(
            "http://127.0.0.1:9",
            HttpClientConfig {
                retry: RetryConfig::none(),
                request_timeout: Duration::from_secs(2),
                auth: None,
            },
        )
        .unwrap();
        let err = client.call("getblockcount", vec![]).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }
}
