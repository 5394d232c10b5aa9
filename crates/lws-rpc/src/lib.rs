//! Upstream daemon oracle client.
//!
//! The request handlers treat the daemon as a request/response oracle with
//! per-call timeouts. `client` holds the transport, `daemon` the typed
//! methods, `rates` the decorative exchange-rate source.

pub mod client;
pub mod daemon;
pub mod error;
pub mod rates;

pub use client::{DaemonClient, DaemonConfig};
pub use daemon::{
    AmountWithOutputs, FeeEstimate, OutputKeyMask, RandomOutput, SendRawTxResult,
};
pub use error::{RatesError, RpcError};
pub use rates::{RateSource, Rates, RATES_INTERVAL};
