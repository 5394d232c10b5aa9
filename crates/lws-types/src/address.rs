//! Public account addresses.
//!
//! A standard address encodes the spend and view public keys under a
//! network-specific varint tag. The light-wallet server only deals in
//! standard addresses; integrated and subaddress forms are rejected.

use crate::base58;
use crate::constants::{Network, KEY_SIZE};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address must be a non-empty string")]
    Empty,

    #[error("invalid address length ({0})")]
    InvalidLength(usize),

    #[error("base58 decode error: {0}")]
    Base58(#[from] base58::Base58Error),

    #[error("unknown address prefix 0x{0:x} (wrong network?)")]
    UnknownPrefix(u64),

    #[error("address payload must be {expected} bytes, got {actual}")]
    InvalidPayload { expected: usize, actual: usize },
}

/// The spend/view public key pair of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountAddress {
    pub spend_public: [u8; KEY_SIZE],
    pub view_public: [u8; KEY_SIZE],
}

impl AccountAddress {
    /// Parse and validate a standard base58 address for `network`.
    pub fn from_str(network: Network, address: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::Empty);
        }
        if address.len() < 90 || address.len() > 120 {
            return Err(AddressError::InvalidLength(address.len()));
        }

        let (tag, payload) = base58::decode_address(address)?;
        if tag != network.address_prefix() {
            return Err(AddressError::UnknownPrefix(tag));
        }
        if payload.len() != KEY_SIZE * 2 {
            return Err(AddressError::InvalidPayload {
                expected: KEY_SIZE * 2,
                actual: payload.len(),
            });
        }

        let mut spend_public = [0u8; KEY_SIZE];
        spend_public.copy_from_slice(&payload[..KEY_SIZE]);
        let mut view_public = [0u8; KEY_SIZE];
        view_public.copy_from_slice(&payload[KEY_SIZE..]);

        Ok(AccountAddress { spend_public, view_public })
    }

    /// Re-encode as a base58 string for `network`.
    pub fn to_string(&self, network: Network) -> String {
        let mut payload = [0u8; KEY_SIZE * 2];
        payload[..KEY_SIZE].copy_from_slice(&self.spend_public);
        payload[KEY_SIZE..].copy_from_slice(&self.view_public);
        base58::encode_address(network.address_prefix(), &payload)
    }

    /// The 64-byte concatenation used as the database key.
    pub fn to_bytes(&self) -> [u8; KEY_SIZE * 2] {
        let mut out = [0u8; KEY_SIZE * 2];
        out[..KEY_SIZE].copy_from_slice(&self.spend_public);
        out[KEY_SIZE..].copy_from_slice(&self.view_public);
        out
    }

    pub fn from_bytes(bytes: &[u8; KEY_SIZE * 2]) -> Self {
        let mut spend_public = [0u8; KEY_SIZE];
        spend_public.copy_from_slice(&bytes[..KEY_SIZE]);
        let mut view_public = [0u8; KEY_SIZE];
        view_public.copy_from_slice(&bytes[KEY_SIZE..]);
        AccountAddress { spend_public, view_public }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_mainnet() {
        let addr = AccountAddress {
            spend_public: [0x01; 32],
            view_public: [0x02; 32],
        };
        let encoded = addr.to_string(Network::Mainnet);
        let parsed = AccountAddress::from_str(Network::Mainnet, &encoded).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn wrong_network_rejected() {
        let addr = AccountAddress {
            spend_public: [0x11; 32],
            view_public: [0x22; 32],
        };
        let encoded = addr.to_string(Network::Testnet);
        assert!(matches!(
            AccountAddress::from_str(Network::Mainnet, &encoded),
            Err(AddressError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn empty_and_garbage_rejected() {
        assert!(matches!(
            AccountAddress::from_str(Network::Mainnet, "  "),
            Err(AddressError::Empty)
        ));
        assert!(AccountAddress::from_str(Network::Mainnet, "notanaddress").is_err());
    }

    #[test]
    fn byte_key_roundtrip() {
        let addr = AccountAddress {
            spend_public: [0xaa; 32],
            view_public: [0xbb; 32],
        };
        assert_eq!(AccountAddress::from_bytes(&addr.to_bytes()), addr);
    }
}
