//! Typed daemon RPC methods used by the request handlers: fee estimates,
//! decoy outputs, output keys, and transaction relay.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::json;

use crate::client::DaemonClient;
use crate::error::RpcError;

/// Receive timeout for quick queries (fees, output keys, relay).
pub const RECEIVE_SHORT: Duration = Duration::from_secs(20);

/// Receive timeout for the random-output selection, which can take the
/// daemon a while on large rings.
pub const RECEIVE_RANDOM_OUTS: Duration = Duration::from_secs(120);

fn hex32<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 32], D::Error> {
    let text: String = Deserialize::deserialize(de)?;
    let mut out = [0u8; 32];
    hex::decode_to_slice(&text, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

/// `get_fee_estimate` result.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeEstimate {
    /// Estimated fee per kilobyte in atomic units.
    pub fee: u64,
    #[serde(default)]
    pub status: String,
}

/// One decoy candidate for an amount.
#[derive(Debug, Clone, Deserialize)]
pub struct RandomOutput {
    pub amount_index: u64,
    #[serde(deserialize_with = "hex32")]
    pub key: [u8; 32],
}

/// Decoy candidates grouped per requested amount.
#[derive(Debug, Clone, Deserialize)]
pub struct AmountWithOutputs {
    pub amount: u64,
    pub outputs: Vec<RandomOutput>,
}

#[derive(Debug, Deserialize)]
struct RandomOutputsResult {
    amounts_with_outputs: Vec<AmountWithOutputs>,
}

/// Key, commitment mask and unlock state for one on-chain output.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputKeyMask {
    #[serde(deserialize_with = "hex32")]
    pub key: [u8; 32],
    #[serde(deserialize_with = "hex32")]
    pub mask: [u8; 32],
    #[serde(default)]
    pub unlocked: bool,
}

#[derive(Debug, Deserialize)]
struct OutputKeysResult {
    keys: Vec<OutputKeyMask>,
}

/// `/send_raw_transaction` result.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRawTxResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub not_relayed: bool,
}

impl DaemonClient {
    /// Per-kilobyte fee estimate over the next few blocks.
    pub async fn get_fee_estimate(&self, grace_blocks: u64) -> Result<FeeEstimate, RpcError> {
        self.call(
            "get_fee_estimate",
            json!({ "grace_blocks": grace_blocks }),
            RECEIVE_SHORT,
        )
        .await
    }

    /// `count` random unlocked decoy candidates for each amount.
    pub async fn get_random_outputs(
        &self,
        count: u64,
        amounts: &[u64],
    ) -> Result<Vec<AmountWithOutputs>, RpcError> {
        let result: RandomOutputsResult = self
            .call(
                "get_random_outputs_for_amounts",
                json!({ "count": count, "amounts": amounts }),
                RECEIVE_RANDOM_OUTS,
            )
            .await?;
        Ok(result.amounts_with_outputs)
    }

    /// Output keys and commitment masks for `(amount, index)` pairs.
    pub async fn get_output_keys(
        &self,
        outputs: &[(u64, u64)],
    ) -> Result<Vec<OutputKeyMask>, RpcError> {
        let outputs: Vec<_> = outputs
            .iter()
            .map(|(amount, index)| json!({ "amount": amount, "index": index }))
            .collect();
        let result: OutputKeysResult = self
            .call(
                "get_output_keys",
                json!({ "outputs": outputs }),
                Duration::from_secs(30),
            )
            .await?;
        Ok(result.keys)
    }

    /// Relay a raw transaction blob (hex).
    pub async fn send_raw_transaction(&self, tx_hex: &str) -> Result<SendRawTxResult, RpcError> {
        self.post(
            "/send_raw_transaction",
            &json!({ "tx_as_hex": tx_hex, "do_not_relay": false }),
            RECEIVE_SHORT,
        )
        .await
    }
}
