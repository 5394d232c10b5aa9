//! Store entities and their fixed-width encodings.
//!
//! Every record is a fixed-size little-endian byte layout so that cursor
//! scans never allocate and duplicate-key tables can order values by a
//! byte-level comparator (see `tables`).

use lws_types::AccountAddress;

use crate::error::DbError;

/// Visibility of an account. Hidden accounts read as nonexistent through
/// every client-facing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccountStatus {
    Active = 0,
    Inactive = 1,
    Hidden = 2,
}

impl AccountStatus {
    pub fn from_u8(value: u8) -> Result<Self, DbError> {
        match value {
            0 => Ok(AccountStatus::Active),
            1 => Ok(AccountStatus::Inactive),
            2 => Ok(AccountStatus::Hidden),
            _ => Err(DbError::Corrupt("unknown account status tag")),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Hidden => "hidden",
        }
    }

    pub fn is_hidden(self) -> bool {
        matches!(self, AccountStatus::Hidden)
    }

    pub const ALL: [AccountStatus; 3] =
        [AccountStatus::Active, AccountStatus::Inactive, AccountStatus::Hidden];
}

/// A user account. The status lives in the table key, not the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub id: u32,
    pub address: AccountAddress,
    /// Secret view key entrusted to the server.
    pub view_key: [u8; 32],
    /// Highest block height the scanner has processed for this account.
    pub scan_height: u64,
    /// Block height scanning (re)started from.
    pub start_height: u64,
    /// Unix seconds of the last authenticated request.
    pub access_time: u32,
    /// Unix seconds of account creation.
    pub creation_time: u32,
}

/// Identity of a received output: origin block plus the per-amount global
/// output index assigned by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutputId {
    pub height: u64,
    pub low: u64,
}

/// Where a record came from on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TransactionLink {
    pub height: u64,
    pub tx_hash: [u8; 32],
}

/// Packed output flags.
pub mod extra {
    pub const COINBASE: u8 = 1;
    pub const RINGCT: u8 = 2;
}

/// A received output as written by the chain scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub id: OutputId,
    pub link: TransactionLink,
    /// Index of this output within its transaction.
    pub index: u32,
    pub amount: u64,
    pub mixin_count: u32,
    pub timestamp: u64,
    pub tx_public: [u8; 32],
    pub tx_prefix_hash: [u8; 32],
    pub unlock_time: u64,
    /// Bitwise OR of `extra::*` flags.
    pub flags: u8,
    /// 0, 8 or 32.
    pub payment_id_len: u8,
    pub ringct_mask: [u8; 32],
    /// Short ids occupy the first 8 bytes.
    pub payment_id: [u8; 32],
}

impl Output {
    pub fn is_coinbase(&self) -> bool {
        self.flags & extra::COINBASE != 0
    }

    pub fn is_ringct(&self) -> bool {
        self.flags & extra::RINGCT != 0
    }

    /// Payment id bytes, if any were attached to the transaction.
    pub fn payment_id_bytes(&self) -> Option<&[u8]> {
        match self.payment_id_len {
            8 => Some(&self.payment_id[..8]),
            32 => Some(&self.payment_id[..]),
            _ => None,
        }
    }
}

/// A detected spend of one of the account's outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spend {
    /// `OutputId` of the consumed output; the output must exist.
    pub source: OutputId,
    pub link: TransactionLink,
    /// Key-image that consumed the output.
    pub image: [u8; 32],
    pub mixin_count: u32,
    pub timestamp: u64,
    pub unlock_time: u64,
}

/// Kind of a pending admin-approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestKind {
    CreateAccount = 0,
    ImportScan = 1,
}

impl RequestKind {
    pub fn from_u8(value: u8) -> Result<Self, DbError> {
        match value {
            0 => Ok(RequestKind::CreateAccount),
            1 => Ok(RequestKind::ImportScan),
            _ => Err(DbError::Corrupt("unknown request kind tag")),
        }
    }
}

/// A pending request, keyed by `(kind, address)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestInfo {
    pub kind: RequestKind,
    pub address: AccountAddress,
    pub view_key: [u8; 32],
    pub start_height: u64,
}

/// One entry of the recent-block window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: [u8; 32],
}

// ─── Fixed-width codecs ─────────────────────────────────────────────────────

pub const ACCOUNT_RECORD_SIZE: usize = 124;
pub const OUTPUT_RECORD_SIZE: usize = 218;
pub const SPEND_RECORD_SIZE: usize = 108;
pub const REQUEST_RECORD_SIZE: usize = 40;

struct Writer<'a>(&'a mut [u8], usize);

impl<'a> Writer<'a> {
    fn put(&mut self, bytes: &[u8]) {
        self.0[self.1..self.1 + bytes.len()].copy_from_slice(bytes);
        self.1 += bytes.len();
    }
}

struct Reader<'a>(&'a [u8], usize);

impl<'a> Reader<'a> {
    fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.0[self.1..self.1 + N]);
        self.1 += N;
        out
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.bytes::<8>())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.bytes::<4>())
    }

    fn u8(&mut self) -> u8 {
        let b = self.0[self.1];
        self.1 += 1;
        b
    }
}

impl Account {
    pub fn encode(&self) -> [u8; ACCOUNT_RECORD_SIZE] {
        let mut buf = [0u8; ACCOUNT_RECORD_SIZE];
        let mut w = Writer(&mut buf, 0);
        w.put(&self.address.spend_public);
        w.put(&self.address.view_public);
        w.put(&self.view_key);
        w.put(&self.id.to_le_bytes());
        w.put(&self.scan_height.to_le_bytes());
        w.put(&self.start_height.to_le_bytes());
        w.put(&self.access_time.to_le_bytes());
        w.put(&self.creation_time.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8; ACCOUNT_RECORD_SIZE]) -> Account {
        let mut r = Reader(data, 0);
        let spend_public = r.bytes::<32>();
        let view_public = r.bytes::<32>();
        let view_key = r.bytes::<32>();
        let id = r.u32();
        let scan_height = r.u64();
        let start_height = r.u64();
        let access_time = r.u32();
        let creation_time = r.u32();
        Account {
            id,
            address: AccountAddress { spend_public, view_public },
            view_key,
            scan_height,
            start_height,
            access_time,
            creation_time,
        }
    }
}

impl Output {
    pub fn encode(&self) -> [u8; OUTPUT_RECORD_SIZE] {
        let mut buf = [0u8; OUTPUT_RECORD_SIZE];
        let mut w = Writer(&mut buf, 0);
        w.put(&self.id.height.to_le_bytes());
        w.put(&self.id.low.to_le_bytes());
        w.put(&self.link.height.to_le_bytes());
        w.put(&self.link.tx_hash);
        w.put(&self.index.to_le_bytes());
        w.put(&self.amount.to_le_bytes());
        w.put(&self.mixin_count.to_le_bytes());
        w.put(&self.timestamp.to_le_bytes());
        w.put(&self.tx_public);
        w.put(&self.tx_prefix_hash);
        w.put(&self.unlock_time.to_le_bytes());
        w.put(&[self.flags, self.payment_id_len]);
        w.put(&self.ringct_mask);
        w.put(&self.payment_id);
        buf
    }

    pub fn decode(data: &[u8; OUTPUT_RECORD_SIZE]) -> Output {
        let mut r = Reader(data, 0);
        Output {
            id: OutputId { height: r.u64(), low: r.u64() },
            link: TransactionLink { height: r.u64(), tx_hash: r.bytes::<32>() },
            index: r.u32(),
            amount: r.u64(),
            mixin_count: r.u32(),
            timestamp: r.u64(),
            tx_public: r.bytes::<32>(),
            tx_prefix_hash: r.bytes::<32>(),
            unlock_time: r.u64(),
            flags: r.u8(),
            payment_id_len: r.u8(),
            ringct_mask: r.bytes::<32>(),
            payment_id: r.bytes::<32>(),
        }
    }
}

impl Spend {
    pub fn encode(&self) -> [u8; SPEND_RECORD_SIZE] {
        let mut buf = [0u8; SPEND_RECORD_SIZE];
        let mut w = Writer(&mut buf, 0);
        w.put(&self.link.height.to_le_bytes());
        w.put(&self.link.tx_hash);
        w.put(&self.source.height.to_le_bytes());
        w.put(&self.source.low.to_le_bytes());
        w.put(&self.image);
        w.put(&self.mixin_count.to_le_bytes());
        w.put(&self.timestamp.to_le_bytes());
        w.put(&self.unlock_time.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8; SPEND_RECORD_SIZE]) -> Spend {
        let mut r = Reader(data, 0);
        Spend {
            link: TransactionLink { height: r.u64(), tx_hash: r.bytes::<32>() },
            source: OutputId { height: r.u64(), low: r.u64() },
            image: r.bytes::<32>(),
            mixin_count: r.u32(),
            timestamp: r.u64(),
            unlock_time: r.u64(),
        }
    }
}

impl RequestInfo {
    pub fn encode_value(&self) -> [u8; REQUEST_RECORD_SIZE] {
        let mut buf = [0u8; REQUEST_RECORD_SIZE];
        let mut w = Writer(&mut buf, 0);
        w.put(&self.view_key);
        w.put(&self.start_height.to_le_bytes());
        buf
    }

    pub fn decode_value(
        kind: RequestKind,
        address: AccountAddress,
        data: &[u8; REQUEST_RECORD_SIZE],
    ) -> RequestInfo {
        let mut r = Reader(data, 0);
        RequestInfo {
            kind,
            address,
            view_key: r.bytes::<32>(),
            start_height: r.u64(),
        }
    }
}
