//! Store error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("no account with the specified address exists")]
    AccountNotFound,

    #[error("account with the specified address already exists")]
    AccountExists,

    #[error("a request of this type for this address is already pending")]
    DuplicateRequest,

    #[error("exceeded maximum number of pending account requests")]
    CreateQueueMax,

    #[error("a blockchain reorg was detected while appending hashes")]
    Reorg,

    #[error("exceeded internal buffer for blockchain hashes")]
    BlockBufferOverflow,

    #[error("block hash window is empty")]
    NoBlocks,

    #[error("stored record is corrupt: {0}")]
    Corrupt(&'static str),
}

pub type DbResult<T> = Result<T, DbError>;
