//! redb table definitions and record value types.
//!
//! Duplicate-key tables (`outputs`, `spends`, `images`) are redb multimap
//! tables. redb orders multimap values by their `Key` comparator, so the
//! record newtypes implement `redb::Key` decoding the little-endian sort
//! fields rather than comparing raw bytes:
//!
//! - outputs sort by `output.id` (height, then low)
//! - spends sort by `(link.height, link.tx_hash, source)`
//! - key-images sort ascending bytewise

use std::cmp::Ordering;

use redb::{MultimapTableDefinition, TableDefinition, TypeName};

use crate::data::{
    ACCOUNT_RECORD_SIZE, OUTPUT_RECORD_SIZE, REQUEST_RECORD_SIZE, SPEND_RECORD_SIZE,
};

/// address bytes -> (status, account id)
pub const ACCOUNTS_BY_ADDRESS: TableDefinition<&[u8; 64], (u8, u32)> =
    TableDefinition::new("accounts_by_address");

/// (status, account id) -> account record; status first so per-status scans
/// are contiguous.
pub const ACCOUNTS_BY_ID: TableDefinition<(u8, u32), AccountRecord> =
    TableDefinition::new("accounts_by_id");

/// account id -> ordered output records
pub const OUTPUTS: MultimapTableDefinition<u32, OutputRecord> =
    MultimapTableDefinition::new("outputs");

/// account id -> ordered spend records
pub const SPENDS: MultimapTableDefinition<u32, SpendRecord> =
    MultimapTableDefinition::new("spends");

/// output id -> key-images that consumed it (more than one only while a
/// reorg is being resolved)
pub const IMAGES: MultimapTableDefinition<(u64, u64), &[u8; 32]> =
    MultimapTableDefinition::new("images");

/// (request kind, address bytes) -> request record; the key enforces one
/// pending request per kind per address.
pub const REQUESTS: TableDefinition<(u8, &[u8; 64]), RequestRecord> =
    TableDefinition::new("requests");

/// height -> block hash, pruned to the recent window
pub const BLOCKS: TableDefinition<u64, &[u8; 32]> = TableDefinition::new("blocks");

macro_rules! fixed_record {
    ($name:ident, $size:expr, $type_name:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub [u8; $size]);

        impl redb::Value for $name {
            type SelfType<'a>
                = $name
            where
                Self: 'a;
            type AsBytes<'a>
                = &'a [u8; $size]
            where
                Self: 'a;

            fn fixed_width() -> Option<usize> {
                Some($size)
            }

            fn from_bytes<'a>(data: &'a [u8]) -> $name
            where
                Self: 'a,
            {
                let mut buf = [0u8; $size];
                buf.copy_from_slice(data);
                $name(buf)
            }

            fn as_bytes<'a, 'b: 'a>(value: &'a $name) -> &'a [u8; $size]
            where
                Self: 'a + 'b,
            {
                &value.0
            }

            fn type_name() -> TypeName {
                TypeName::new($type_name)
            }
        }
    };
}

fixed_record!(AccountRecord, ACCOUNT_RECORD_SIZE, "lws_db::AccountRecord");
fixed_record!(OutputRecord, OUTPUT_RECORD_SIZE, "lws_db::OutputRecord");
fixed_record!(SpendRecord, SPEND_RECORD_SIZE, "lws_db::SpendRecord");
fixed_record!(RequestRecord, REQUEST_RECORD_SIZE, "lws_db::RequestRecord");

fn le64(data: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(buf)
}

impl redb::Key for OutputRecord {
    // Sort key: output id at offset 0 (height u64, low u64).
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        le64(a, 0)
            .cmp(&le64(b, 0))
            .then_with(|| le64(a, 8).cmp(&le64(b, 8)))
    }
}

impl redb::Key for SpendRecord {
    // Sort key: link at offset 0 (height u64, tx hash 32 bytes), then the
    // source output id at offset 40.
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        le64(a, 0)
            .cmp(&le64(b, 0))
            .then_with(|| a[8..40].cmp(&b[8..40]))
            .then_with(|| le64(a, 40).cmp(&le64(b, 40)))
            .then_with(|| le64(a, 48).cmp(&le64(b, 48)))
    }
}
