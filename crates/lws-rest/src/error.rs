//! Handler error carrier.
//!
//! Every error has a category, a stable numeric code within that category,
//! and an equivalence relation to generic [`Condition`]s so callers can
//! test for "timed out" or "interrupted" without enumerating kinds. Errors
//! wrapped from lower layers that have no mapped kind report code 0, the
//! reserved invalid-code value.

use thiserror::Error;

use crate::json::JsonError;
use lws_db::DbError;
use lws_rpc::{RatesError, RpcError};
use lws_types::AddressError;

/// Generic conditions an [`Error`] can be equivalent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    BadAddress,
    Interrupted,
    NoBufferSpace,
    OutOfRange,
    TimedOut,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("account with the specified address already exists")]
    AccountExists,

    #[error("invalid base58 public address: {0}")]
    BadAddress(#[from] AddressError),

    #[error("address/viewkey mismatch")]
    BadViewKey,

    #[error("unable to sync blockchain - wrong network?")]
    BadBlockchain,

    #[error("client submitted an invalid transaction")]
    BadClientTx,

    #[error("response from daemon was invalid")]
    BadDaemonResponse,

    #[error("a blockchain reorg has been detected")]
    BlockchainReorg,

    #[error("exceeded maximum number of pending account requests")]
    CreateQueueMax,

    #[error("daemon send/receive timed out")]
    DaemonTimeout,

    #[error("a request of this type for this address has already been made")]
    DuplicateRequest,

    #[error("exceeded internal buffer for blockchain hashes")]
    ExceededBlockchainBuffer,

    #[error("exceeded enforced size limits for request")]
    ExceededRestRequestLimit,

    #[error("exchange rates fetching is disabled")]
    ExchangeRatesDisabled,

    #[error("exchange rates fetching failed")]
    ExchangeRatesFetch,

    #[error("exchange rates are older than cache interval")]
    ExchangeRatesOld,

    #[error("no account with the specified address exists")]
    NoSuchAccount,

    #[error("in-process signal to abort the process was received")]
    SignalAbortProcess,

    #[error("in-process signal to abort scanning was received")]
    SignalAbortScan,

    #[error("an unknown in-process signal was received")]
    SignalUnknown,

    #[error("system clock is out of range for the storage format")]
    SystemClockInvalidRange,

    #[error("daemon failed to relay transaction from client")]
    TxRelayFailed,

    #[error("cryptographic key derivation failed")]
    CryptoFailure,

    #[error("URI scheme must be http://")]
    InvalidUriScheme,

    #[error("{0}")]
    Json(#[from] JsonError),

    #[error("database error: {0}")]
    Database(DbError),

    #[error("daemon client error: {0}")]
    Daemon(RpcError),

    #[error("serious database error: {0}")]
    StorageCorrupt(&'static str),

    #[error("internal task failure: {0}")]
    Internal(&'static str),
}

impl Error {
    /// Error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Json(_) => "json",
            Error::CryptoFailure
            | Error::InvalidUriScheme
            | Error::Database(_)
            | Error::Daemon(_)
            | Error::StorageCorrupt(_)
            | Error::Internal(_) => "common",
            _ => "lws",
        }
    }

    /// Stable numeric identity within the category. 0 is reserved for
    /// errors with no mapped kind (the invalid error code).
    pub fn code(&self) -> u32 {
        match self {
            Error::AccountExists => 1,
            Error::BadAddress(_) => 2,
            Error::BadViewKey => 3,
            Error::BadBlockchain => 4,
            Error::BadClientTx => 5,
            Error::BadDaemonResponse => 6,
            Error::BlockchainReorg => 7,
            Error::CreateQueueMax => 8,
            Error::DaemonTimeout => 9,
            Error::DuplicateRequest => 10,
            Error::ExceededBlockchainBuffer => 11,
            Error::ExceededRestRequestLimit => 12,
            Error::ExchangeRatesDisabled => 13,
            Error::ExchangeRatesFetch => 14,
            Error::ExchangeRatesOld => 15,
            Error::NoSuchAccount => 16,
            Error::SignalAbortProcess => 17,
            Error::SignalAbortScan => 18,
            Error::SignalUnknown => 19,
            Error::SystemClockInvalidRange => 20,
            Error::TxRelayFailed => 21,
            Error::CryptoFailure => 1,
            Error::InvalidUriScheme => 2,
            Error::Json(err) => err.code(),
            Error::Database(_) | Error::Daemon(_) | Error::StorageCorrupt(_) | Error::Internal(_) => 0,
        }
    }

    /// Semantic equivalence to a generic condition.
    pub fn matches(&self, condition: Condition) -> bool {
        let mapped = match self {
            Error::BadAddress(_) | Error::BadViewKey => Some(Condition::BadAddress),
            Error::DaemonTimeout => Some(Condition::TimedOut),
            Error::SignalAbortProcess | Error::SignalAbortScan | Error::SignalUnknown => {
                Some(Condition::Interrupted)
            }
            Error::ExceededBlockchainBuffer => Some(Condition::NoBufferSpace),
            Error::SystemClockInvalidRange => Some(Condition::OutOfRange),
            Error::Json(JsonError::BufferOverflow) => Some(Condition::NoBufferSpace),
            Error::Json(JsonError::Overflow) | Error::Json(JsonError::Underflow) => {
                Some(Condition::OutOfRange)
            }
            _ => None,
        };
        mapped == Some(condition)
    }

    /// HTTP status for a failed handler. Failed authentication is
    /// indistinguishable from a missing account; timeouts invite a retry.
    pub fn http_status(&self) -> u16 {
        if matches!(self, Error::NoSuchAccount | Error::BadViewKey) {
            return 403;
        }
        if self.matches(Condition::TimedOut) {
            return 503;
        }
        if matches!(self, Error::Json(_)) {
            return 400;
        }
        500
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::AccountNotFound => Error::NoSuchAccount,
            DbError::AccountExists => Error::AccountExists,
            DbError::DuplicateRequest => Error::DuplicateRequest,
            DbError::CreateQueueMax => Error::CreateQueueMax,
            DbError::Reorg => Error::BlockchainReorg,
            DbError::BlockBufferOverflow => Error::ExceededBlockchainBuffer,
            DbError::Corrupt(msg) => Error::StorageCorrupt(msg),
            other => Error::Database(other),
        }
    }
}

impl From<RpcError> for Error {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Timeout => Error::DaemonTimeout,
            RpcError::Json(_) | RpcError::NoResult | RpcError::Malformed(_) | RpcError::Rpc { .. } => {
                Error::BadDaemonResponse
            }
            other => Error::Daemon(other),
        }
    }
}

impl From<RatesError> for Error {
    fn from(err: RatesError) -> Self {
        match err {
            RatesError::Disabled => Error::ExchangeRatesDisabled,
            RatesError::Fetch(_) => Error::ExchangeRatesFetch,
            RatesError::Old => Error::ExchangeRatesOld,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::AccountExists.code(), 1);
        assert_eq!(Error::NoSuchAccount.code(), 16);
        assert_eq!(Error::TxRelayFailed.code(), 21);
        assert_eq!(Error::Database(DbError::NoBlocks).code(), 0);
    }

    #[test]
    fn condition_equivalence() {
        assert!(Error::BadViewKey.matches(Condition::BadAddress));
        assert!(Error::DaemonTimeout.matches(Condition::TimedOut));
        assert!(Error::SignalAbortScan.matches(Condition::Interrupted));
        assert!(!Error::NoSuchAccount.matches(Condition::TimedOut));
    }

    #[test]
    fn auth_failures_share_the_forbidden_status() {
        assert_eq!(Error::NoSuchAccount.http_status(), 403);
        assert_eq!(Error::BadViewKey.http_status(), 403);
        assert_eq!(Error::DaemonTimeout.http_status(), 503);
        assert_eq!(Error::TxRelayFailed.http_status(), 500);
    }
}
