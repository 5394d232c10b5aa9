//! Base JSON-RPC 2.0 HTTP client for the upstream daemon.
//!
//! One `DaemonClient` is shared process-wide; each logical call clones it
//! to get an isolated send/receive pair. The connect timeout plays the
//! "send" role; each call supplies its own receive timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

/// Configuration for the daemon client.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Base URL, e.g. `http://localhost:18081`.
    pub url: String,
    /// Time allowed to establish the connection and send the request.
    pub send_timeout: Duration,
    /// When set, caps every receive timeout. Meant for tests and for
    /// operators fronting a slow daemon.
    pub receive_timeout_cap: Option<Duration>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:18081".to_string(),
            send_timeout: Duration::from_secs(10),
            receive_timeout_cap: None,
        }
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Async client for the upstream daemon's JSON-RPC and raw endpoints.
#[derive(Clone)]
pub struct DaemonClient {
    client: reqwest::Client,
    url: Arc<str>,
    receive_timeout_cap: Option<Duration>,
    request_id: Arc<AtomicU64>,
}

impl DaemonClient {
    pub fn new(config: DaemonConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.send_timeout)
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').into(),
            receive_timeout_cap: config.receive_timeout_cap,
            request_id: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn receive_timeout(&self, requested: Duration) -> Duration {
        match self.receive_timeout_cap {
            Some(cap) => requested.min(cap),
            None => requested,
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call a JSON-RPC 2.0 method (POST to `/json_rpc`), waiting at most
    /// `receive_timeout` for the full response.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        receive_timeout: Duration,
    ) -> Result<T, RpcError> {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id(),
            method,
            params,
        };

        let resp = self
            .client
            .post(format!("{}/json_rpc", self.url))
            .timeout(self.receive_timeout(receive_timeout))
            .json(&req)
            .send()
            .await?
            .error_for_status()?;

        let body: JsonRpcResponse = resp.json().await?;
        if let Some(err) = body.error {
            return Err(RpcError::Rpc { code: err.code, message: err.message });
        }
        let result = body.result.ok_or(RpcError::NoResult)?;
        Ok(serde_json::from_value(result)?)
    }

    /// POST JSON to a raw (non JSON-RPC) endpoint.
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
        receive_timeout: Duration,
    ) -> Result<T, RpcError> {
        let resp = self
            .client
            .post(format!("{}{}", self.url, endpoint))
            .timeout(self.receive_timeout(receive_timeout))
            .json(body)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json().await?)
    }
}
