//! CryptoNote block base58.
//!
//! Not Bitcoin Base58Check: data is processed in 8-byte blocks, each block
//! encoding to exactly 11 characters, with a size table for the partial
//! trailing block. Addresses carry a varint tag prefix and a 4-byte
//! keccak-256 checksum suffix.

use crate::constants::CHECKSUM_SIZE;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const FULL_BLOCK_SIZE: usize = 8;
const FULL_ENCODED_BLOCK_SIZE: usize = 11;

/// Encoded character count per partial-block byte count.
const ENCODED_BLOCK_SIZES: [usize; 9] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

/// Decoded byte count per encoded character count, -1 where no block size
/// produces that many characters.
const DECODED_BLOCK_SIZES: [i8; 12] = [0, -1, 1, 2, -1, 3, 4, 5, -1, 6, 7, 8];

#[derive(Debug, Error)]
pub enum Base58Error {
    #[error("invalid base58 character {0:?}")]
    InvalidCharacter(char),

    #[error("invalid encoded length (trailing block of {0} characters)")]
    InvalidLength(usize),

    #[error("base58 block value out of range")]
    Overflow,

    #[error("decoded address too short ({0} bytes)")]
    TooShort(usize),

    #[error("address checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid varint prefix")]
    BadVarint,
}

const fn build_reverse_alphabet() -> [i8; 128] {
    let mut table = [-1i8; 128];
    let mut i = 0;
    while i < 58 {
        table[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    table
}

static REVERSE_ALPHABET: [i8; 128] = build_reverse_alphabet();

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut out = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut out);
    out
}

fn encode_block(block: &[u8], out: &mut String) {
    let encoded_size = ENCODED_BLOCK_SIZES[block.len()];
    let mut num = block.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

    let mut buf = [ALPHABET[0]; FULL_ENCODED_BLOCK_SIZE];
    let mut i = encoded_size;
    while num > 0 {
        i -= 1;
        buf[i] = ALPHABET[(num % 58) as usize];
        num /= 58;
    }
    out.push_str(std::str::from_utf8(&buf[..encoded_size]).expect("alphabet is ASCII"));
}

fn decode_block(block: &[u8], out: &mut Vec<u8>) -> Result<(), Base58Error> {
    let decoded_size = DECODED_BLOCK_SIZES
        .get(block.len())
        .copied()
        .filter(|&n| n >= 0)
        .ok_or(Base58Error::InvalidLength(block.len()))? as usize;

    if decoded_size == 0 {
        return Ok(());
    }

    let mut num: u64 = 0;
    for &ch in block {
        let digit = REVERSE_ALPHABET
            .get(ch as usize)
            .copied()
            .filter(|&d| d >= 0)
            .ok_or(Base58Error::InvalidCharacter(ch as char))?;
        num = num
            .checked_mul(58)
            .and_then(|n| n.checked_add(digit as u64))
            .ok_or(Base58Error::Overflow)?;
    }

    if decoded_size < FULL_BLOCK_SIZE && num >= (1u64 << (8 * decoded_size)) {
        return Err(Base58Error::Overflow);
    }

    out.extend_from_slice(&num.to_be_bytes()[FULL_BLOCK_SIZE - decoded_size..]);
    Ok(())
}

/// Encode binary data to CryptoNote base58.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() / FULL_BLOCK_SIZE + 1) * FULL_ENCODED_BLOCK_SIZE);
    for block in data.chunks(FULL_BLOCK_SIZE) {
        encode_block(block, &mut out);
    }
    out
}

/// Decode a CryptoNote base58 string.
pub fn decode(encoded: &str) -> Result<Vec<u8>, Base58Error> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / FULL_ENCODED_BLOCK_SIZE * FULL_BLOCK_SIZE + FULL_BLOCK_SIZE);
    for block in bytes.chunks(FULL_ENCODED_BLOCK_SIZE) {
        decode_block(block, &mut out)?;
    }
    Ok(out)
}

fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn decode_varint(data: &[u8]) -> Result<(u64, usize), Base58Error> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i as u32);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Base58Error::BadVarint)
}

/// Encode an address payload under a varint tag, appending the keccak
/// checksum before base58 conversion.
pub fn encode_address(tag: u64, data: &[u8]) -> String {
    let mut payload = Vec::with_capacity(9 + data.len() + CHECKSUM_SIZE);
    encode_varint(tag, &mut payload);
    payload.extend_from_slice(data);

    let checksum = keccak256(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_SIZE]);

    encode(&payload)
}

/// Decode an address, verifying the checksum. Returns the varint tag and
/// the raw payload.
pub fn decode_address(address: &str) -> Result<(u64, Vec<u8>), Base58Error> {
    let decoded = decode(address)?;
    if decoded.len() <= CHECKSUM_SIZE {
        return Err(Base58Error::TooShort(decoded.len()));
    }

    let (payload, checksum) = decoded.split_at(decoded.len() - CHECKSUM_SIZE);
    if keccak256(payload)[..CHECKSUM_SIZE] != *checksum {
        return Err(Base58Error::ChecksumMismatch);
    }

    let (tag, read) = decode_varint(payload)?;
    Ok((tag, payload[read..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        for len in [0usize, 1, 7, 8, 9, 32, 64, 69] {
            let data: Vec<u8> = (0..len as u8).collect();
            assert_eq!(decode(&encode(&data)).unwrap(), data, "len {}", len);
        }
    }

    #[test]
    fn rejects_bad_character() {
        assert!(matches!(decode("0O"), Err(Base58Error::InvalidCharacter(_))));
    }

    #[test]
    fn rejects_bad_trailing_length() {
        // A 1-character or 4-character trailing block never occurs.
        assert!(decode("1").is_err());
        assert!(decode("11111111111" /* full */).is_ok());
        assert!(decode("111111111111111").is_err());
    }

    #[test]
    fn address_roundtrip() {
        let data = [0xabu8; 64];
        let encoded = encode_address(18, &data);
        let (tag, payload) = decode_address(&encoded).unwrap();
        assert_eq!(tag, 18);
        assert_eq!(payload, data);
    }

    #[test]
    fn address_checksum_detects_corruption() {
        let mut encoded = encode_address(18, &[0xabu8; 64]).into_bytes();
        let last = encoded.len() - 1;
        encoded[last] = if encoded[last] == b'1' { b'2' } else { b'1' };
        let corrupted = String::from_utf8(encoded).unwrap();
        assert!(decode_address(&corrupted).is_err());
    }
}
