//! Persistent account/output store for the light-wallet server.
//!
//! Backed by redb: readers take MVCC snapshots concurrent with the single
//! serialised writer. Domain tables are laid out in `tables`, fixed-width
//! record codecs in `data`, and the reader/writer surface in `storage`.

pub mod data;
pub mod error;
pub mod storage;
pub mod tables;

pub use data::{
    Account, AccountStatus, BlockInfo, Output, OutputId, RequestInfo, RequestKind, Spend,
    TransactionLink,
};
pub use error::{DbError, DbResult};
pub use storage::{
    ImageCursor, OutputCursor, OutputKeyCursor, SpendCursor, Storage, StorageReader,
    BLOCKCHAIN_BUFFER_MAX, CREATE_QUEUE_MAX,
};
