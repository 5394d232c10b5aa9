//! Structural validation of client-submitted raw transactions.
//!
//! Walks the CryptoNote transaction prefix (varint fields, typed inputs
//! and outputs, extra blob) without interpreting signatures. A blob that
//! fails the walk is rejected before it ever reaches the daemon.

const TXIN_GEN: u8 = 0xff;
const TXIN_TO_KEY: u8 = 0x02;
const TXOUT_TO_KEY: u8 = 0x02;
const TXOUT_TO_TAGGED_KEY: u8 = 0x03;

/// Sanity caps so a hostile blob cannot ask us to loop forever.
const MAX_INPUTS: u64 = 4096;
const MAX_OUTPUTS: u64 = 4096;
const MAX_RING_SIZE: u64 = 4096;
const MAX_EXTRA_SIZE: u64 = 65_536;

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn skip(&mut self, count: usize) -> Result<(), &'static str> {
        if self.remaining() < count {
            return Err("truncated transaction blob");
        }
        self.offset += count;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, &'static str> {
        if self.remaining() < 1 {
            return Err("truncated transaction blob");
        }
        let byte = self.data[self.offset];
        self.offset += 1;
        Ok(byte)
    }

    fn read_varint(&mut self) -> Result<u64, &'static str> {
        let mut value: u64 = 0;
        for shift in (0..64).step_by(7) {
            let byte = self.read_byte()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err("varint too long")
    }
}

/// Validate that `blob` parses as a transaction. Returns whether the
/// transaction is coinbase (a coinbase carries no signatures).
pub fn validate_tx_blob(blob: &[u8]) -> Result<(), &'static str> {
    let mut c = Cursor::new(blob);

    let version = c.read_varint()?;
    if version == 0 || version > 2 {
        return Err("unsupported transaction version");
    }
    c.read_varint()?; // unlock time

    let input_count = c.read_varint()?;
    if input_count == 0 || input_count > MAX_INPUTS {
        return Err("bad input count");
    }

    let mut coinbase = false;
    for _ in 0..input_count {
        match c.read_byte()? {
            TXIN_GEN => {
                c.read_varint()?; // height
                coinbase = true;
            }
            TXIN_TO_KEY => {
                c.read_varint()?; // amount
                let offsets = c.read_varint()?;
                if offsets == 0 || offsets > MAX_RING_SIZE {
                    return Err("bad ring size");
                }
                for _ in 0..offsets {
                    c.read_varint()?;
                }
                c.skip(32)?; // key image
            }
            _ => return Err("unknown input type"),
        }
    }

    let output_count = c.read_varint()?;
    if output_count == 0 || output_count > MAX_OUTPUTS {
        return Err("bad output count");
    }
    for _ in 0..output_count {
        c.read_varint()?; // amount
        match c.read_byte()? {
            TXOUT_TO_KEY => c.skip(32)?,
            TXOUT_TO_TAGGED_KEY => c.skip(33)?,
            _ => return Err("unknown output type"),
        }
    }

    let extra_size = c.read_varint()?;
    if extra_size > MAX_EXTRA_SIZE {
        return Err("oversized tx extra");
    }
    c.skip(extra_size as usize)?;

    // Everything after the prefix is signature data; a non-coinbase
    // transaction must carry some.
    if !coinbase && c.remaining() == 0 {
        return Err("missing signatures");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_varint(buf: &mut Vec<u8>, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                buf.push(byte);
                return;
            }
            buf.push(byte | 0x80);
        }
    }

    /// A minimal well-formed v2 transfer: one key input with a ring of
    /// three, one tagged-key output, empty extra, one trailing rct byte.
    fn sample_tx() -> Vec<u8> {
        let mut tx = Vec::new();
        push_varint(&mut tx, 2); // version
        push_varint(&mut tx, 0); // unlock time
        push_varint(&mut tx, 1); // inputs
        tx.push(TXIN_TO_KEY);
        push_varint(&mut tx, 0); // amount (hidden)
        push_varint(&mut tx, 3); // ring size
        push_varint(&mut tx, 100);
        push_varint(&mut tx, 7);
        push_varint(&mut tx, 2);
        tx.extend_from_slice(&[0x5a; 32]); // key image
        push_varint(&mut tx, 1); // outputs
        push_varint(&mut tx, 0); // amount
        tx.push(TXOUT_TO_TAGGED_KEY);
        tx.extend_from_slice(&[0x6b; 33]);
        push_varint(&mut tx, 0); // extra
        tx.push(0x00); // rct type byte stands in for signatures
        tx
    }

    #[test]
    fn accepts_well_formed_transfer() {
        assert!(validate_tx_blob(&sample_tx()).is_ok());
    }

    #[test]
    fn rejects_truncation_anywhere() {
        let tx = sample_tx();
        for cut in 1..tx.len().saturating_sub(1) {
            assert!(
                validate_tx_blob(&tx[..cut]).is_err(),
                "accepted truncation at {}",
                cut
            );
        }
    }

    #[test]
    fn rejects_bad_version_and_types() {
        let mut tx = sample_tx();
        tx[0] = 9;
        assert!(validate_tx_blob(&tx).is_err());

        let mut tx = sample_tx();
        tx[3] = 0x77; // input type tag
        assert!(validate_tx_blob(&tx).is_err());
    }

    #[test]
    fn rejects_signatureless_transfer() {
        let mut tx = sample_tx();
        tx.pop();
        assert!(validate_tx_blob(&tx).is_err());
    }

    #[test]
    fn accepts_signatureless_coinbase() {
        let mut tx = Vec::new();
        push_varint(&mut tx, 1);
        push_varint(&mut tx, 60);
        push_varint(&mut tx, 1);
        tx.push(TXIN_GEN);
        push_varint(&mut tx, 1234); // height
        push_varint(&mut tx, 1);
        push_varint(&mut tx, 600_000_000_000);
        tx.push(TXOUT_TO_KEY);
        tx.extend_from_slice(&[0x11; 32]);
        push_varint(&mut tx, 0);
        assert!(validate_tx_blob(&tx).is_ok());
    }
}
