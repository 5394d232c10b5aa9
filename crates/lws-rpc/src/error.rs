//! RPC error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("daemon send/receive timed out")]
    Timeout,

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("daemon RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("no result in daemon response")]
    NoResult,

    #[error("malformed daemon response: {0}")]
    Malformed(&'static str),
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            RpcError::Timeout
        } else if err.is_decode() {
            RpcError::Malformed("undecodable daemon response body")
        } else {
            RpcError::Http(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum RatesError {
    #[error("exchange rates fetching is disabled")]
    Disabled,

    #[error("exchange rates fetch failed: {0}")]
    Fetch(reqwest::Error),

    #[error("cached exchange rates are older than the refresh interval")]
    Old,
}
