//! Output projection for the unspent-outputs response.
//!
//! Recomputes the one-time public key from the submitted view key and, for
//! ring-ct outputs, re-derives the ECDH-coded amount and mask plus the
//! Pedersen commitment, exactly the triple the funding transaction carried
//! for this recipient.

use lws_crypto::{
    amount_to_key, derivation_to_scalar, derive_public_key, ecdh_encode,
    generate_key_derivation, pedersen_commit, EcdhTuple,
};
use lws_db::Output;

use crate::error::Error;
use crate::json::{Hex32, Timestamp, U64S};
use crate::types::UnspentOutput;

pub fn project_output(
    out: &Output,
    images: Vec<[u8; 32]>,
    view_key: &[u8; 32],
    spend_public: &[u8; 32],
) -> Result<UnspentOutput, Error> {
    let derivation =
        generate_key_derivation(&out.tx_public, view_key).ok_or(Error::CryptoFailure)?;
    let public_key =
        derive_public_key(&derivation, out.index, spend_public).ok_or(Error::CryptoFailure)?;

    let rct = if out.is_ringct() {
        let scalar = derivation_to_scalar(&derivation, out.index);
        let coded = ecdh_encode(
            &EcdhTuple { mask: out.ringct_mask, amount: amount_to_key(out.amount) },
            &scalar,
        );
        let commitment = pedersen_commit(out.amount, &out.ringct_mask);

        let mut blob = [0u8; 96];
        blob[..32].copy_from_slice(&commitment);
        blob[32..64].copy_from_slice(&coded.mask);
        blob[64..].copy_from_slice(&coded.amount);
        Some(hex::encode(blob))
    } else {
        None
    };

    Ok(UnspentOutput {
        amount: U64S(out.amount),
        public_key: Hex32(public_key),
        index: out.index,
        global_index: out.id.low,
        tx_id: out.id.low,
        tx_hash: Hex32(out.link.tx_hash),
        tx_prefix_hash: Hex32(out.tx_prefix_hash),
        tx_pub_key: Hex32(out.tx_public),
        timestamp: Timestamp(out.timestamp),
        height: out.link.height,
        spend_key_images: images.into_iter().map(Hex32).collect(),
        rct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::scalar::Scalar;
    use lws_crypto::{ecdh_decode, secret_key_to_public};
    use lws_db::{OutputId, TransactionLink};

    fn user_keys() -> ([u8; 32], [u8; 32], [u8; 32]) {
        let view_key = Scalar::from_bytes_mod_order([0x21; 32]).to_bytes();
        let spend_key = Scalar::from_bytes_mod_order([0x43; 32]).to_bytes();
        let view_public = secret_key_to_public(&view_key).unwrap();
        let spend_public = secret_key_to_public(&spend_key).unwrap();
        (view_key, view_public, spend_public)
    }

    fn ringct_output(tx_secret: &[u8; 32], amount: u64) -> Output {
        Output {
            id: OutputId { height: 100, low: 4 },
            link: TransactionLink { height: 100, tx_hash: [0x10; 32] },
            index: 1,
            amount,
            mixin_count: 15,
            timestamp: 1_650_000_000,
            tx_public: secret_key_to_public(tx_secret).unwrap(),
            tx_prefix_hash: [0x20; 32],
            unlock_time: 0,
            flags: lws_db::data::extra::RINGCT,
            payment_id_len: 0,
            ringct_mask: Scalar::from_bytes_mod_order([0x66; 32]).to_bytes(),
            payment_id: [0; 32],
        }
    }

    #[test]
    fn ringct_blob_decodes_back_to_amount_and_mask() {
        let (view_key, _, spend_public) = user_keys();
        let tx_secret = Scalar::from_bytes_mod_order([0x07; 32]).to_bytes();
        let out = ringct_output(&tx_secret, 2_500);

        let projected = project_output(&out, vec![[0xee; 32]], &view_key, &spend_public).unwrap();
        let blob = hex::decode(projected.rct.as_deref().unwrap()).unwrap();
        assert_eq!(blob.len(), 96);

        // The client recomputes the same shared scalar from the tx public
        // key and decodes the tuple.
        let derivation = generate_key_derivation(&out.tx_public, &view_key).unwrap();
        let scalar = derivation_to_scalar(&derivation, out.index);
        let mut mask = [0u8; 32];
        mask.copy_from_slice(&blob[32..64]);
        let mut amount = [0u8; 32];
        amount.copy_from_slice(&blob[64..]);

        let plain = ecdh_decode(&EcdhTuple { mask, amount }, &scalar);
        assert_eq!(plain.mask, out.ringct_mask);
        let mut amount_le = [0u8; 8];
        amount_le.copy_from_slice(&plain.amount[..8]);
        assert_eq!(u64::from_le_bytes(amount_le), 2_500);

        // And the commitment opens with the recovered pair.
        let mut commitment = [0u8; 32];
        commitment.copy_from_slice(&blob[..32]);
        assert_eq!(commitment, pedersen_commit(2_500, &plain.mask));
    }

    #[test]
    fn stealth_key_matches_sender_derivation() {
        let (view_key, view_public, spend_public) = user_keys();
        let tx_secret = Scalar::from_bytes_mod_order([0x09; 32]).to_bytes();
        let out = ringct_output(&tx_secret, 777);

        let projected = project_output(&out, vec![], &view_key, &spend_public).unwrap();

        // The sender derives the same one-time key from the recipient's
        // public keys and the tx secret.
        let sender_derivation = generate_key_derivation(&view_public, &tx_secret).unwrap();
        let sender_key =
            derive_public_key(&sender_derivation, out.index, &spend_public).unwrap();
        assert_eq!(projected.public_key.0, sender_key);
    }

    #[test]
    fn plain_output_has_no_rct_blob() {
        let (view_key, _, spend_public) = user_keys();
        let tx_secret = Scalar::from_bytes_mod_order([0x0b; 32]).to_bytes();
        let mut out = ringct_output(&tx_secret, 50);
        out.flags = lws_db::data::extra::COINBASE;

        let projected = project_output(&out, vec![], &view_key, &spend_public).unwrap();
        assert!(projected.rct.is_none());
    }
}
