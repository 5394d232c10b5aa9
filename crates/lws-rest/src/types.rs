//! Request and response bodies for the seven endpoints.
//!
//! Requests reject unknown fields; the address arrives as a base58 string
//! and is validated by the handlers so that a malformed address is
//! distinguishable from malformed JSON.

use serde::{Deserialize, Serialize};

use crate::json::{Hex32, HexBytes, Timestamp, U64S};
use lws_rpc::Rates;

// ─── Requests ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub address: String,
    pub view_key: Hex32,
    pub create_account: bool,
}

/// Shared body of `get_address_info`, `get_address_txs`, `import_request`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressRequest {
    pub address: String,
    pub view_key: Hex32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnspentOutsRequest {
    pub address: String,
    pub view_key: Hex32,
    pub amount: U64S,
    #[serde(default)]
    pub mixin: Option<u32>,
    #[serde(default)]
    pub use_dust: Option<bool>,
    #[serde(default)]
    pub dust_threshold: Option<U64S>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomOutsRequest {
    pub count: u64,
    pub amounts: Vec<U64S>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitRawTxRequest {
    pub tx: String,
}

// ─── Responses ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub new_address: bool,
}

/// One consumed output, as it appears in `spent_outputs` arrays.
#[derive(Debug, Serialize)]
pub struct SpentOutput {
    pub amount: U64S,
    pub key_image: Hex32,
    pub tx_pub_key: Hex32,
    pub out_index: u32,
    pub mixin: u32,
}

#[derive(Debug, Serialize)]
pub struct AddressInfoResponse {
    pub locked_funds: U64S,
    pub total_received: U64S,
    pub total_sent: U64S,
    pub scanned_height: u64,
    pub scanned_block_height: u64,
    pub start_height: u64,
    pub transaction_height: u64,
    pub blockchain_height: u64,
    pub spent_outputs: Vec<SpentOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rates: Option<Rates>,
}

#[derive(Debug, Serialize)]
pub struct AddressTx {
    pub id: u64,
    pub hash: Hex32,
    pub timestamp: Timestamp,
    pub total_received: U64S,
    pub total_sent: U64S,
    pub unlock_time: u64,
    pub height: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<HexBytes>,
    pub coinbase: bool,
    pub mempool: bool,
    pub mixin: u32,
    pub spent_outputs: Vec<SpentOutput>,
}

#[derive(Debug, Serialize)]
pub struct AddressTxsResponse {
    pub total_received: U64S,
    pub scanned_height: u64,
    pub scanned_block_height: u64,
    pub start_height: u64,
    pub transaction_height: u64,
    pub blockchain_height: u64,
    pub transactions: Vec<AddressTx>,
}

/// One spendable output, including the recomputed stealth key and, for
/// ring-ct outputs, the `commitment || mask || amount` hex blob.
#[derive(Debug, Serialize)]
pub struct UnspentOutput {
    pub amount: U64S,
    pub public_key: Hex32,
    pub index: u32,
    pub global_index: u64,
    pub tx_id: u64,
    pub tx_hash: Hex32,
    pub tx_prefix_hash: Hex32,
    pub tx_pub_key: Hex32,
    pub timestamp: Timestamp,
    pub height: u64,
    pub spend_key_images: Vec<Hex32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rct: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnspentOutsResponse {
    pub per_kb_fee: u64,
    pub amount: U64S,
    pub outputs: Vec<UnspentOutput>,
}

#[derive(Debug, Serialize)]
pub struct RandomOutput {
    pub global_index: U64S,
    pub public_key: Hex32,
    pub rct: Hex32,
}

#[derive(Debug, Serialize)]
pub struct RandomAmountOuts {
    pub amount: U64S,
    pub outputs: Vec<RandomOutput>,
}

#[derive(Debug, Serialize)]
pub struct RandomOutsResponse {
    pub amount_outs: Vec<RandomAmountOuts>,
}

#[derive(Debug, Serialize)]
pub struct ImportRequestResponse {
    pub import_fee: U64S,
    pub new_request: bool,
    pub request_fulfilled: bool,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SubmitRawTxResponse {
    pub status: &'static str,
}
