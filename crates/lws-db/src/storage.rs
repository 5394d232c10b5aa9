//! Storage handle, read snapshots, and the serialised writer.
//!
//! `Storage` wraps one process-wide redb environment. Readers take MVCC
//! snapshots (`start_read`) and hand out typed cursors; all cursors from
//! one reader observe the same snapshot. Writers serialise behind redb's
//! single write transaction; every mutation either commits entirely or
//! leaves the store untouched (a failed operation drops the transaction,
//! which aborts it).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{
    Database, MultimapRange, MultimapValue, ReadTransaction, ReadableDatabase,
    ReadableMultimapTable, ReadableTable, ReadableTableMetadata,
};

use lws_types::AccountAddress;

use crate::data::{
    Account, AccountStatus, BlockInfo, Output, OutputId, RequestInfo, RequestKind, Spend,
};
use crate::error::{DbError, DbResult};
use crate::tables::{
    AccountRecord, OutputRecord, RequestRecord, SpendRecord, ACCOUNTS_BY_ADDRESS, ACCOUNTS_BY_ID,
    BLOCKS, IMAGES, OUTPUTS, REQUESTS, SPENDS,
};

/// Upper bound on the recent-block hash window.
pub const BLOCKCHAIN_BUFFER_MAX: usize = 10_000;

/// Upper bound on pending account requests of all kinds.
pub const CREATE_QUEUE_MAX: u64 = 10_000;

/// Shared handle to the on-disk account store.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl Storage {
    /// Open (or create) the store at `path`, pre-creating every table so
    /// read transactions never observe a missing table.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(ACCOUNTS_BY_ADDRESS)?;
            let _ = txn.open_table(ACCOUNTS_BY_ID)?;
            let _ = txn.open_multimap_table(OUTPUTS)?;
            let _ = txn.open_multimap_table(SPENDS)?;
            let _ = txn.open_multimap_table(IMAGES)?;
            let _ = txn.open_table(REQUESTS)?;
            let _ = txn.open_table(BLOCKS)?;
        }
        txn.commit()?;

        Ok(Storage { db: Arc::new(db) })
    }

    /// Take an MVCC read snapshot.
    pub fn start_read(&self) -> DbResult<StorageReader> {
        Ok(StorageReader { txn: self.db.begin_read()? })
    }

    // ─── Writer operations ──────────────────────────────────────────────

    /// Queue a `CreateAccount` request. The scan start height is pinned to
    /// the current chain tip so approval does not trigger a genesis rescan.
    pub fn creation_request(&self, address: &AccountAddress, view_key: &[u8; 32]) -> DbResult<()> {
        let addr_bytes = address.to_bytes();
        let txn = self.db.begin_write()?;
        {
            let accounts = txn.open_table(ACCOUNTS_BY_ADDRESS)?;
            if accounts.get(&addr_bytes)?.is_some() {
                return Err(DbError::AccountExists);
            }

            let start_height = txn
                .open_table(BLOCKS)?
                .last()?
                .map(|(height, _)| height.value())
                .unwrap_or(0);

            let mut requests = txn.open_table(REQUESTS)?;
            let key = (RequestKind::CreateAccount as u8, &addr_bytes);
            if requests.get(&key)?.is_some() {
                return Err(DbError::DuplicateRequest);
            }
            if requests.len()? >= CREATE_QUEUE_MAX {
                return Err(DbError::CreateQueueMax);
            }

            let info = RequestInfo {
                kind: RequestKind::CreateAccount,
                address: *address,
                view_key: *view_key,
                start_height,
            };
            requests.insert(&key, &RequestRecord(info.encode_value()))?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Queue an `ImportScan` request for an existing account.
    pub fn import_request(&self, address: &AccountAddress, start_height: u64) -> DbResult<()> {
        let addr_bytes = address.to_bytes();
        let txn = self.db.begin_write()?;
        {
            let accounts = txn.open_table(ACCOUNTS_BY_ADDRESS)?;
            let Some(entry) = accounts.get(&addr_bytes)? else {
                return Err(DbError::AccountNotFound);
            };
            let (status, id) = entry.value();
            let account = txn
                .open_table(ACCOUNTS_BY_ID)?
                .get(&(status, id))?
                .map(|guard| Account::decode(&guard.value().0))
                .ok_or(DbError::Corrupt("account id entry missing for address entry"))?;

            let mut requests = txn.open_table(REQUESTS)?;
            let key = (RequestKind::ImportScan as u8, &addr_bytes);
            if requests.get(&key)?.is_some() {
                return Err(DbError::DuplicateRequest);
            }
            if requests.len()? >= CREATE_QUEUE_MAX {
                return Err(DbError::CreateQueueMax);
            }

            let info = RequestInfo {
                kind: RequestKind::ImportScan,
                address: *address,
                view_key: account.view_key,
                start_height,
            };
            requests.insert(&key, &RequestRecord(info.encode_value()))?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Create an account directly (the admin fast path), `Active` and
    /// scanning from `start_height`.
    pub fn add_account(
        &self,
        address: &AccountAddress,
        view_key: &[u8; 32],
        start_height: u64,
    ) -> DbResult<u32> {
        let txn = self.db.begin_write()?;
        let id = {
            let mut by_address = txn.open_table(ACCOUNTS_BY_ADDRESS)?;
            if by_address.get(&address.to_bytes())?.is_some() {
                return Err(DbError::AccountExists);
            }
            let mut by_id = txn.open_table(ACCOUNTS_BY_ID)?;
            let id = next_account_id(&by_id)?;

            let now = unix_now();
            let account = Account {
                id,
                address: *address,
                view_key: *view_key,
                scan_height: start_height,
                start_height,
                access_time: now as u32,
                creation_time: now as u32,
            };
            by_id.insert(&(AccountStatus::Active as u8, id), &AccountRecord(account.encode()))?;
            by_address.insert(&address.to_bytes(), &(AccountStatus::Active as u8, id))?;
            id
        };
        txn.commit()?;
        Ok(id)
    }

    /// Approve pending requests. `CreateAccount` promotes the request to an
    /// `Active` account; `ImportScan` rewinds the account's start and scan
    /// heights to the requested height. Returns how many were applied.
    pub fn accept_requests(&self, kind: RequestKind, addresses: &[AccountAddress]) -> DbResult<u32> {
        let txn = self.db.begin_write()?;
        let mut applied = 0;
        {
            let mut requests = txn.open_table(REQUESTS)?;
            let mut by_address = txn.open_table(ACCOUNTS_BY_ADDRESS)?;
            let mut by_id = txn.open_table(ACCOUNTS_BY_ID)?;

            for address in addresses {
                let addr_bytes = address.to_bytes();
                let Some(record) = requests.remove(&(kind as u8, &addr_bytes))? else {
                    continue;
                };
                let info = RequestInfo::decode_value(kind, *address, &record.value().0);
                drop(record);

                match kind {
                    RequestKind::CreateAccount => {
                        if by_address.get(&addr_bytes)?.is_some() {
                            continue; // promoted through another path
                        }
                        let id = next_account_id(&by_id)?;
                        let now = unix_now();
                        let account = Account {
                            id,
                            address: *address,
                            view_key: info.view_key,
                            scan_height: info.start_height,
                            start_height: info.start_height,
                            access_time: now as u32,
                            creation_time: now as u32,
                        };
                        by_id.insert(
                            &(AccountStatus::Active as u8, id),
                            &AccountRecord(account.encode()),
                        )?;
                        by_address.insert(&addr_bytes, &(AccountStatus::Active as u8, id))?;
                    }
                    RequestKind::ImportScan => {
                        let Some(entry) = by_address.get(&addr_bytes)? else {
                            continue;
                        };
                        let (status, id) = entry.value();
                        drop(entry);
                        let Some(guard) = by_id.get(&(status, id))? else {
                            return Err(DbError::Corrupt(
                                "account id entry missing for address entry",
                            ));
                        };
                        let mut account = Account::decode(&guard.value().0);
                        drop(guard);
                        account.start_height = info.start_height;
                        account.scan_height = info.start_height;
                        by_id.insert(&(status, id), &AccountRecord(account.encode()))?;
                    }
                }
                applied += 1;
            }
        }
        txn.commit()?;
        Ok(applied)
    }

    /// Drop pending requests without applying them.
    pub fn reject_requests(&self, kind: RequestKind, addresses: &[AccountAddress]) -> DbResult<u32> {
        let txn = self.db.begin_write()?;
        let mut removed = 0;
        {
            let mut requests = txn.open_table(REQUESTS)?;
            for address in addresses {
                if requests.remove(&(kind as u8, &address.to_bytes()))?.is_some() {
                    removed += 1;
                }
            }
        }
        txn.commit()?;
        Ok(removed)
    }

    /// Change an account's visibility status.
    pub fn set_account_status(
        &self,
        address: &AccountAddress,
        status: AccountStatus,
    ) -> DbResult<()> {
        let addr_bytes = address.to_bytes();
        let txn = self.db.begin_write()?;
        {
            let mut by_address = txn.open_table(ACCOUNTS_BY_ADDRESS)?;
            let Some(entry) = by_address.get(&addr_bytes)? else {
                return Err(DbError::AccountNotFound);
            };
            let (old_status, id) = entry.value();
            drop(entry);

            if old_status != status as u8 {
                let mut by_id = txn.open_table(ACCOUNTS_BY_ID)?;
                let record = {
                    let Some(guard) = by_id.remove(&(old_status, id))? else {
                        return Err(DbError::Corrupt("account id entry missing for address entry"));
                    };
                    AccountRecord(guard.value().0)
                };
                by_id.insert(&(status as u8, id), &record)?;
                by_address.insert(&addr_bytes, &(status as u8, id))?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Record the time of a successful authentication. Best effort; the
    /// caller treats failure as non-fatal.
    pub fn touch_access_time(&self, address: &AccountAddress, when: u32) -> DbResult<()> {
        let addr_bytes = address.to_bytes();
        let txn = self.db.begin_write()?;
        {
            let by_address = txn.open_table(ACCOUNTS_BY_ADDRESS)?;
            let Some(entry) = by_address.get(&addr_bytes)? else {
                return Err(DbError::AccountNotFound);
            };
            let (status, id) = entry.value();
            drop(entry);

            let mut by_id = txn.open_table(ACCOUNTS_BY_ID)?;
            let Some(guard) = by_id.get(&(status, id))? else {
                return Err(DbError::Corrupt("account id entry missing for address entry"));
            };
            let mut account = Account::decode(&guard.value().0);
            drop(guard);
            account.access_time = when;
            by_id.insert(&(status, id), &AccountRecord(account.encode()))?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Append scanned block hashes. `hashes[0]` must match the stored hash
    /// at `start_height` (the anchor) unless the window is empty; a
    /// mismatch means the chain reorganised under the scanner. Entries
    /// above the anchor are replaced, and the window is pruned from the
    /// front to `BLOCKCHAIN_BUFFER_MAX` entries.
    pub fn sync_blocks(&self, start_height: u64, hashes: &[[u8; 32]]) -> DbResult<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        if hashes.len() > BLOCKCHAIN_BUFFER_MAX {
            return Err(DbError::BlockBufferOverflow);
        }

        let txn = self.db.begin_write()?;
        {
            let mut blocks = txn.open_table(BLOCKS)?;

            if !blocks.is_empty()? {
                match blocks.get(&start_height)? {
                    Some(anchor) if *anchor.value() == hashes[0] => {}
                    _ => return Err(DbError::Reorg),
                }

                let stale: Vec<u64> = blocks
                    .range(start_height + 1..)?
                    .map(|entry| entry.map(|(height, _)| height.value()))
                    .collect::<Result<_, _>>()?;
                for height in stale {
                    blocks.remove(&height)?;
                }
            }

            for (offset, hash) in hashes.iter().enumerate() {
                blocks.insert(&(start_height + offset as u64), hash)?;
            }

            while blocks.len()? as usize > BLOCKCHAIN_BUFFER_MAX {
                let oldest = blocks
                    .first()?
                    .map(|(height, _)| height.value())
                    .ok_or(DbError::Corrupt("window count disagrees with contents"))?;
                blocks.remove(&oldest)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Record outputs the scanner found for an account.
    pub fn add_outputs(&self, account_id: u32, outputs: &[Output]) -> DbResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_multimap_table(OUTPUTS)?;
            for output in outputs {
                table.insert(&account_id, &OutputRecord(output.encode()))?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Record spends the scanner found for an account, indexing each
    /// key-image under the source output.
    pub fn add_spends(&self, account_id: u32, spends: &[Spend]) -> DbResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_multimap_table(SPENDS)?;
            let mut images = txn.open_multimap_table(IMAGES)?;
            for spend in spends {
                table.insert(&account_id, &SpendRecord(spend.encode()))?;
                images.insert(&(spend.source.height, spend.source.low), &spend.image)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Advance scan progress for the given accounts.
    pub fn update_scan_heights(&self, addresses: &[AccountAddress], height: u64) -> DbResult<()> {
        let txn = self.db.begin_write()?;
        {
            let by_address = txn.open_table(ACCOUNTS_BY_ADDRESS)?;
            let mut by_id = txn.open_table(ACCOUNTS_BY_ID)?;
            for address in addresses {
                let Some(entry) = by_address.get(&address.to_bytes())? else {
                    return Err(DbError::AccountNotFound);
                };
                let (status, id) = entry.value();
                drop(entry);

                let Some(guard) = by_id.get(&(status, id))? else {
                    return Err(DbError::Corrupt("account id entry missing for address entry"));
                };
                let mut account = Account::decode(&guard.value().0);
                drop(guard);
                account.scan_height = height;
                by_id.insert(&(status, id), &AccountRecord(account.encode()))?;
            }
        }
        txn.commit()?;
        Ok(())
    }
}

fn next_account_id(
    by_id: &impl ReadableTable<(u8, u32), AccountRecord>,
) -> DbResult<u32> {
    let mut max_id = 0;
    for entry in by_id.iter()? {
        let (key, _) = entry?;
        max_id = max_id.max(key.value().1);
    }
    Ok(max_id + 1)
}

// ─── Read snapshot ──────────────────────────────────────────────────────────

/// One MVCC read snapshot. All cursors observe the snapshot taken at
/// `start_read`; drop (or `finish`) releases it. Finish the reader before
/// awaiting any upstream call so pages are not pinned across network I/O.
pub struct StorageReader {
    txn: ReadTransaction,
}

impl StorageReader {
    /// Look up an account by address. Hidden accounts are returned with
    /// their status; the caller decides whether they are visible.
    pub fn get_account(&self, address: &AccountAddress) -> DbResult<(AccountStatus, Account)> {
        let by_address = self.txn.open_table(ACCOUNTS_BY_ADDRESS)?;
        let Some(entry) = by_address.get(&address.to_bytes())? else {
            return Err(DbError::AccountNotFound);
        };
        let (status_raw, id) = entry.value();
        let status = AccountStatus::from_u8(status_raw)?;

        let by_id = self.txn.open_table(ACCOUNTS_BY_ID)?;
        let account = by_id
            .get(&(status_raw, id))?
            .map(|guard| Account::decode(&guard.value().0))
            .ok_or(DbError::Corrupt("account id entry missing for address entry"))?;
        Ok((status, account))
    }

    /// Cursor over the account's outputs, ordered by output id.
    pub fn get_outputs(&self, account_id: u32) -> DbResult<OutputCursor> {
        let table = self.txn.open_multimap_table(OUTPUTS)?;
        Ok(OutputCursor { values: table.get(&account_id)? })
    }

    /// Cursor over the account's spends, ordered by (link, source).
    pub fn get_spends(&self, account_id: u32) -> DbResult<SpendCursor> {
        let table = self.txn.open_multimap_table(SPENDS)?;
        Ok(SpendCursor { values: table.get(&account_id)? })
    }

    /// Cursor over the key-images recorded against one output.
    pub fn get_images(&self, id: OutputId) -> DbResult<ImageCursor> {
        let table = self.txn.open_multimap_table(IMAGES)?;
        Ok(ImageCursor { values: table.get(&(id.height, id.low))? })
    }

    /// Key cursor over every account's output range, for whole-store scans.
    pub fn outputs_by_account(&self) -> DbResult<OutputKeyCursor> {
        let table = self.txn.open_multimap_table(OUTPUTS)?;
        Ok(OutputKeyCursor { range: table.range::<u32>(..)? })
    }

    /// Pending request for `(kind, address)`, if any.
    pub fn get_request(
        &self,
        kind: RequestKind,
        address: &AccountAddress,
    ) -> DbResult<Option<RequestInfo>> {
        let requests = self.txn.open_table(REQUESTS)?;
        Ok(requests
            .get(&(kind as u8, &address.to_bytes()))?
            .map(|guard| RequestInfo::decode_value(kind, *address, &guard.value().0)))
    }

    /// Number of pending requests of all kinds.
    pub fn request_count(&self) -> DbResult<u64> {
        Ok(self.txn.open_table(REQUESTS)?.len()?)
    }

    /// Most recent entry of the block window.
    pub fn get_last_block(&self) -> DbResult<BlockInfo> {
        let blocks = self.txn.open_table(BLOCKS)?;
        let (height, hash) = blocks.last()?.ok_or(DbError::NoBlocks)?;
        Ok(BlockInfo { height: height.value(), hash: *hash.value() })
    }

    /// Release the snapshot now instead of at drop.
    pub fn finish(self) {}
}

/// Lazy, move-only value cursor over one account's outputs.
pub struct OutputCursor {
    values: MultimapValue<'static, OutputRecord>,
}

impl Iterator for OutputCursor {
    type Item = DbResult<Output>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.values.next()?;
        Some(
            entry
                .map(|guard| Output::decode(&guard.value().0))
                .map_err(DbError::from),
        )
    }
}

/// Lazy, move-only value cursor over one account's spends.
pub struct SpendCursor {
    values: MultimapValue<'static, SpendRecord>,
}

impl Iterator for SpendCursor {
    type Item = DbResult<Spend>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.values.next()?;
        Some(
            entry
                .map(|guard| Spend::decode(&guard.value().0))
                .map_err(DbError::from),
        )
    }
}

/// Value cursor over the key-images of one output.
pub struct ImageCursor {
    values: MultimapValue<'static, &'static [u8; 32]>,
}

impl Iterator for ImageCursor {
    type Item = DbResult<[u8; 32]>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.values.next()?;
        Some(entry.map(|guard| *guard.value()).map_err(DbError::from))
    }
}

/// Key cursor yielding `(account id, value cursor)` pairs in key order.
pub struct OutputKeyCursor {
    range: MultimapRange<'static, u32, OutputRecord>,
}

impl Iterator for OutputKeyCursor {
    type Item = DbResult<(u32, OutputCursor)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.range.next()?;
        Some(
            entry
                .map(|(key, values)| (key.value(), OutputCursor { values }))
                .map_err(DbError::from),
        )
    }
}
