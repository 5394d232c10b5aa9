//! CryptoNote view-key cryptography.
//!
//! The subset needed to recognise and re-derive received outputs from a
//! secret view key: key derivation, one-time (stealth) public keys, the
//! legacy ECDH tuple coding for ring-ct amounts, and Pedersen commitments.
//!
//! All keys are 32-byte compressed Edwards points or scalars; functions
//! that decompress attacker-supplied points return `None` on invalid input.

use curve25519_dalek::constants::{ED25519_BASEPOINT_POINT, ED25519_BASEPOINT_TABLE};
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;
use tiny_keccak::{Hasher, Keccak};

/// H generator for Pedersen commitments: H = H_p(G).
/// Precomputed, standard across CryptoNote chains (rctTypes).
const H_POINT_BYTES: [u8; 32] = [
    0x8b, 0x65, 0x59, 0x70, 0x15, 0x37, 0x99, 0xaf,
    0x2a, 0xea, 0xdc, 0x9f, 0xf1, 0xad, 0xd0, 0xea,
    0x6c, 0x72, 0x51, 0xd5, 0x41, 0x54, 0xcf, 0xa9,
    0x2c, 0x17, 0x3a, 0x0d, 0xd3, 0x9c, 0x1f, 0x94,
];

/// Keccak-256 (CryptoNote cn_fast_hash, not SHA3).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut out = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut out);
    out
}

/// H_s(data): keccak followed by reduction mod the group order.
pub fn hash_to_scalar(data: &[u8]) -> Scalar {
    Scalar::from_bytes_mod_order(keccak256(data))
}

fn encode_varint(mut val: u32, buf: &mut Vec<u8>) {
    loop {
        let byte = (val & 0x7f) as u8;
        val >>= 7;
        if val == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn decompress(point: &[u8; 32]) -> Option<EdwardsPoint> {
    CompressedEdwardsY(*point).decompress()
}

/// Public key for a secret scalar: P = s * G.
///
/// Returns `None` when the secret is not a canonical scalar, matching the
/// reference `secret_key_to_public_key` check.
pub fn secret_key_to_public(secret: &[u8; 32]) -> Option<[u8; 32]> {
    let scalar: Option<Scalar> = Scalar::from_canonical_bytes(*secret).into();
    let scalar = scalar?;
    Some((ED25519_BASEPOINT_TABLE * &scalar).compress().to_bytes())
}

/// Key derivation: D = 8 * (secret * P), the CryptoNote cofactor-cleared
/// shared secret between a tx public key and a view key.
pub fn generate_key_derivation(tx_public: &[u8; 32], secret: &[u8; 32]) -> Option<[u8; 32]> {
    let point = decompress(tx_public)?;
    let scalar = Scalar::from_bytes_mod_order(*secret);
    let shared = scalar * point;
    let result = shared.mul_by_cofactor();
    Some(result.compress().to_bytes())
}

/// H_s(derivation || varint(index)).
pub fn derivation_to_scalar(derivation: &[u8; 32], output_index: u32) -> Scalar {
    let mut buf = Vec::with_capacity(40);
    buf.extend_from_slice(derivation);
    encode_varint(output_index, &mut buf);
    hash_to_scalar(&buf)
}

/// One-time output key: P' = H_s(D || index) * G + spend_public.
pub fn derive_public_key(
    derivation: &[u8; 32],
    output_index: u32,
    spend_public: &[u8; 32],
) -> Option<[u8; 32]> {
    let base = decompress(spend_public)?;
    let scalar = derivation_to_scalar(derivation, output_index);
    Some((ED25519_BASEPOINT_TABLE * &scalar + base).compress().to_bytes())
}

/// A u64 amount as a 32-byte little-endian scalar (rct d2h).
pub fn amount_to_key(amount: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..8].copy_from_slice(&amount.to_le_bytes());
    out
}

/// A ring-ct ECDH-coded (mask, amount) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdhTuple {
    pub mask: [u8; 32],
    pub amount: [u8; 32],
}

fn ecdh_secrets(shared: &Scalar) -> (Scalar, Scalar) {
    let first = hash_to_scalar(&shared.to_bytes());
    let second = hash_to_scalar(&first.to_bytes());
    (first, second)
}

/// Encode an ECDH tuple under a shared secret scalar (the legacy additive
/// form: mask += H_s(s), amount += H_s(H_s(s))).
pub fn ecdh_encode(tuple: &EcdhTuple, shared: &Scalar) -> EcdhTuple {
    let (sec1, sec2) = ecdh_secrets(shared);
    EcdhTuple {
        mask: (Scalar::from_bytes_mod_order(tuple.mask) + sec1).to_bytes(),
        amount: (Scalar::from_bytes_mod_order(tuple.amount) + sec2).to_bytes(),
    }
}

/// Inverse of [`ecdh_encode`].
pub fn ecdh_decode(tuple: &EcdhTuple, shared: &Scalar) -> EcdhTuple {
    let (sec1, sec2) = ecdh_secrets(shared);
    EcdhTuple {
        mask: (Scalar::from_bytes_mod_order(tuple.mask) - sec1).to_bytes(),
        amount: (Scalar::from_bytes_mod_order(tuple.amount) - sec2).to_bytes(),
    }
}

/// Pedersen commitment: C = mask * G + amount * H.
pub fn pedersen_commit(amount: u64, mask: &[u8; 32]) -> [u8; 32] {
    let amount_scalar = Scalar::from_bytes_mod_order(amount_to_key(amount));
    let mask_scalar = Scalar::from_bytes_mod_order(*mask);
    let h = CompressedEdwardsY(H_POINT_BYTES).decompress().expect("H is a valid point");
    EdwardsPoint::vartime_multiscalar_mul(
        &[mask_scalar, amount_scalar],
        &[ED25519_BASEPOINT_POINT, h],
    )
    .compress()
    .to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_one_gives_basepoint() {
        let mut secret = [0u8; 32];
        secret[0] = 1;
        let public = secret_key_to_public(&secret).unwrap();
        assert_eq!(
            hex::encode(public),
            "5866666666666666666666666666666666666666666666666666666666666666"
        );
    }

    #[test]
    fn non_canonical_secret_rejected() {
        // The group order L itself is not canonical.
        let l: [u8; 32] = [
            0xed, 0xd3, 0xf5, 0x5c, 0x1a, 0x63, 0x12, 0x58,
            0xd6, 0x9c, 0xf7, 0xa2, 0xde, 0xf9, 0xde, 0x14,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
        ];
        assert!(secret_key_to_public(&l).is_none());
    }

    #[test]
    fn derivation_is_symmetric() {
        // 8*(a*B) == 8*(b*A) for keypairs (a, A), (b, B).
        let a = Scalar::from_bytes_mod_order([0x11; 32]).to_bytes();
        let b = Scalar::from_bytes_mod_order([0x77; 32]).to_bytes();
        let pub_a = secret_key_to_public(&a).unwrap();
        let pub_b = secret_key_to_public(&b).unwrap();

        let d1 = generate_key_derivation(&pub_b, &a).unwrap();
        let d2 = generate_key_derivation(&pub_a, &b).unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn derive_public_key_varies_by_index() {
        let derivation = [0x42u8; 32];
        let spend = secret_key_to_public(&Scalar::from_bytes_mod_order([9; 32]).to_bytes()).unwrap();
        let p0 = derive_public_key(&derivation, 0, &spend).unwrap();
        let p1 = derive_public_key(&derivation, 1, &spend).unwrap();
        assert_ne!(p0, p1);
    }

    #[test]
    fn ecdh_roundtrip() {
        let shared = derivation_to_scalar(&[0x33u8; 32], 5);
        let plain = EcdhTuple {
            mask: Scalar::from_bytes_mod_order([0xaa; 32]).to_bytes(),
            amount: amount_to_key(123_456_789),
        };
        let coded = ecdh_encode(&plain, &shared);
        assert_ne!(coded, plain);
        assert_eq!(ecdh_decode(&coded, &shared), plain);

        let mut amount_bytes = [0u8; 8];
        amount_bytes.copy_from_slice(&ecdh_decode(&coded, &shared).amount[..8]);
        assert_eq!(u64::from_le_bytes(amount_bytes), 123_456_789);
    }

    #[test]
    fn pedersen_commit_deterministic_and_binding() {
        let mask = Scalar::from_bytes_mod_order([0x01; 32]).to_bytes();
        let c1 = pedersen_commit(1000, &mask);
        let c2 = pedersen_commit(1000, &mask);
        let c3 = pedersen_commit(1001, &mask);
        assert_eq!(c1, c2);
        assert_ne!(c1, c3);
    }
}
