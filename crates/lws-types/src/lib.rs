//! Shared types for the light-wallet server: network constants, the
//! CryptoNote block base58 codec, and public account addresses.

pub mod address;
pub mod base58;
pub mod constants;

pub use address::{AccountAddress, AddressError};
pub use constants::Network;
