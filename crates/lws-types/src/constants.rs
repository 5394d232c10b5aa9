//! Chain constants and address prefixes.

use serde::{Deserialize, Serialize};

/// Network type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    Stagenet,
}

impl Network {
    /// Base58 varint prefix for standard public addresses on this network.
    pub fn address_prefix(self) -> u64 {
        match self {
            Network::Mainnet => 18,
            Network::Testnet => 53,
            Network::Stagenet => 24,
        }
    }

    /// Reverse lookup from a decoded address tag.
    pub fn from_address_prefix(prefix: u64) -> Option<Network> {
        match prefix {
            18 => Some(Network::Mainnet),
            53 => Some(Network::Testnet),
            24 => Some(Network::Stagenet),
            _ => None,
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "stagenet" | "stage" => Ok(Network::Stagenet),
            _ => Err(format!("unknown network: {} (use mainnet, testnet, or stagenet)", s)),
        }
    }
}

/// Size of a public/secret key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of a transaction/block hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Size of the base58 address checksum in bytes.
pub const CHECKSUM_SIZE: usize = 4;

/// Unlock times above this value are unix timestamps, not block heights.
pub const MAX_BLOCK_NUMBER: u64 = 500_000_000;

/// Blocks a coinbase output stays locked after its origin block.
pub const COINBASE_UNLOCK_WINDOW: u64 = 60;
