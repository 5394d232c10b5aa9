//! Wire-format conventions and JSON-layer errors.
//!
//! Large integers travel as decimal strings for the benefit of
//! dynamically-typed clients; hashes and keys are lowercase unprefixed
//! hex; timestamps are `YYYY-MM-DDTHH:MM:SS.0-00:00` in UTC.

use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON-layer error kinds with stable codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JsonError {
    #[error("JSON writer exceeded a fixed internal buffer")]
    BufferOverflow,

    #[error("JSON parser expected array")]
    ExpectedArray,

    #[error("JSON parser expected bool")]
    ExpectedBool,

    #[error("JSON parser expected double")]
    ExpectedDouble,

    #[error("JSON parser expected float")]
    ExpectedFloat,

    #[error("JSON parser expected object")]
    ExpectedObject,

    #[error("JSON parser expected string")]
    ExpectedString,

    #[error("JSON parser expected unsigned integer")]
    ExpectedUnsigned,

    #[error("JSON parser received invalid hex-ascii string")]
    InvalidHex,

    #[error("JSON parser could not find required field")]
    MissingField,

    #[error("JSON integer exceeded internal maximum value")]
    Overflow,

    #[error("JSON parser encountered a field that it did not expect")]
    UnexpectedField,

    #[error("JSON integer exceeded internal minimum value")]
    Underflow,
}

impl JsonError {
    pub fn code(self) -> u32 {
        match self {
            JsonError::BufferOverflow => 1,
            JsonError::ExpectedArray => 2,
            JsonError::ExpectedBool => 3,
            JsonError::ExpectedDouble => 4,
            JsonError::ExpectedFloat => 5,
            JsonError::ExpectedObject => 6,
            JsonError::ExpectedString => 7,
            JsonError::ExpectedUnsigned => 8,
            JsonError::InvalidHex => 9,
            JsonError::MissingField => 10,
            JsonError::Overflow => 11,
            JsonError::UnexpectedField => 12,
            JsonError::Underflow => 13,
        }
    }

    /// Classify a serde_json error into a wire error kind. The custom
    /// deserializers below embed exact markers; plain serde messages are
    /// matched on their "expected" phrasing.
    pub fn from_serde(err: &serde_json::Error) -> JsonError {
        let msg = err.to_string();
        if msg.contains("invalid hex") {
            JsonError::InvalidHex
        } else if msg.contains("uint64 string out of range") {
            JsonError::Overflow
        } else if msg.contains("missing field") {
            JsonError::MissingField
        } else if msg.contains("unknown field") {
            JsonError::UnexpectedField
        } else if msg.contains("expected a string") || msg.contains("expected a borrowed string") {
            JsonError::ExpectedString
        } else if msg.contains("expected a boolean") {
            JsonError::ExpectedBool
        } else if msg.contains("expected a sequence") {
            JsonError::ExpectedArray
        } else if msg.contains("expected u64") || msg.contains("expected u32") || msg.contains("unsigned") {
            JsonError::ExpectedUnsigned
        } else if msg.contains("expected f64") || msg.contains("expected f32") {
            JsonError::ExpectedFloat
        } else {
            JsonError::ExpectedObject
        }
    }
}

/// A `u64` serialised as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct U64S(pub u64);

impl Serialize for U64S {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for U64S {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let value = text
            .parse::<u64>()
            .map_err(|_| de::Error::custom("uint64 string out of range"))?;
        Ok(U64S(value))
    }
}

/// A 32-byte blob serialised as 64 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hex32(pub [u8; 32]);

impl Serialize for Hex32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hex32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(&text, &mut out)
            .map_err(|_| de::Error::custom("invalid hex key"))?;
        Ok(Hex32(out))
    }
}

/// Variable-length bytes serialised as lowercase hex (payment ids).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

/// Unix seconds serialised in the fixed UTC layout clients expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp(pub u64);

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let secs = i64::try_from(self.0)
            .map_err(|_| ser::Error::custom("system clock out of range"))?;
        let stamp = chrono::DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| ser::Error::custom("system clock out of range"))?;
        serializer.serialize_str(&format!("{}.0-00:00", stamp.format("%Y-%m-%dT%H:%M:%S")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_string_roundtrip() {
        let json = serde_json::to_string(&U64S(u64::MAX)).unwrap();
        assert_eq!(json, "\"18446744073709551615\"");
        let back: U64S = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, u64::MAX);
    }

    #[test]
    fn u64_string_rejects_overflow_and_numbers() {
        let over: Result<U64S, _> = serde_json::from_str("\"18446744073709551616\"");
        assert_eq!(JsonError::from_serde(&over.unwrap_err()), JsonError::Overflow);

        let bare: Result<U64S, _> = serde_json::from_str("7");
        assert_eq!(JsonError::from_serde(&bare.unwrap_err()), JsonError::ExpectedString);
    }

    #[test]
    fn hex32_is_lowercase_and_strict() {
        let json = serde_json::to_string(&Hex32([0xAB; 32])).unwrap();
        assert_eq!(json.len(), 66);
        assert!(json.chars().all(|c| !c.is_ascii_uppercase()));

        let bad: Result<Hex32, _> = serde_json::from_str("\"zz\"");
        assert_eq!(JsonError::from_serde(&bad.unwrap_err()), JsonError::InvalidHex);
    }

    #[test]
    fn timestamp_layout() {
        let json = serde_json::to_string(&Timestamp(0)).unwrap();
        assert_eq!(json, "\"1970-01-01T00:00:00.0-00:00\"");
        let json = serde_json::to_string(&Timestamp(1_600_000_000)).unwrap();
        assert_eq!(json, "\"2020-09-13T12:26:40.0-00:00\"");
    }

    #[test]
    fn missing_and_unknown_fields_classify() {
        #[derive(Debug, serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Probe {
            #[allow(dead_code)]
            a: bool,
        }

        let missing: Result<Probe, _> = serde_json::from_str("{}");
        assert_eq!(JsonError::from_serde(&missing.unwrap_err()), JsonError::MissingField);

        let unknown: Result<Probe, _> = serde_json::from_str("{\"a\":true,\"b\":1}");
        assert_eq!(JsonError::from_serde(&unknown.unwrap_err()), JsonError::UnexpectedField);

        let wrong: Result<Probe, _> = serde_json::from_str("{\"a\":3}");
        assert_eq!(JsonError::from_serde(&wrong.unwrap_err()), JsonError::ExpectedBool);
    }
}
