//! The DXBC container's custom MD5-variant checksum (C2).
//!
//! Differs from standard MD5 only in its padding and length encoding; see
//! `original_source/libs/vkd3d-shader/checksum.c` for the reference this
//! matches bit-for-bit.
use crate::error::{Error, Result};
use crate::md5::Md5State;

/// Byte offset at which the hashable payload begins: past the 16-byte
/// checksum slot and the 4-byte version word.
pub const HASHABLE_PAYLOAD_OFFSET: usize = 20;

/// Compute the four little-endian 32-bit checksum words for `dxbc`, a
/// complete DXBC container (including its header). `dxbc.len()` must be
/// greater than [`HASHABLE_PAYLOAD_OFFSET`].
pub fn compute_dxbc_checksum(dxbc: &[u8]) -> Result<[u32; 4]> {
    if dxbc.len() <= HASHABLE_PAYLOAD_OFFSET {
        return Err(Error::invalid_argument(
            "dxbc payload shorter than the hashable region",
        ));
    }

    let data = &dxbc[HASHABLE_PAYLOAD_OFFSET..];
    let length = data.len();
    let num_bits = (length as u32).wrapping_mul(8);
    let num_bits2 = (num_bits >> 2) | 1;

    let leftover_length = length % 64;
    let mut state = Md5State::new();
    state.update(&data[..length - leftover_length]);
    let tail = &data[length - leftover_length..];

    if leftover_length >= 56 {
        let mut block = [0u8; 128];
        block[..leftover_length].copy_from_slice(tail);
        block[leftover_length] = 0x80;
        state.update(&block[..64]);

        let mut final_block = [0u8; 64];
        final_block[0..4].copy_from_slice(&num_bits.to_le_bytes());
        final_block[60..64].copy_from_slice(&num_bits2.to_le_bytes());
        state.update(&final_block);
    } else {
        let padding_bytes = 64 - leftover_length - 4;
        let mut block = vec![0u8; 4 + leftover_length + padding_bytes];
        block[0..4].copy_from_slice(&num_bits.to_le_bytes());
        block[4..4 + leftover_length].copy_from_slice(tail);
        let pad_start = 4 + leftover_length;
        block[pad_start] = 0x80;
        let num_bits2_at = pad_start + padding_bytes - 4;
        block[num_bits2_at..num_bits2_at + 4].copy_from_slice(&num_bits2.to_le_bytes());
        state.update(&block);
    }

    Ok([state.a, state.b, state.c, state.d])
}

/// Recompute the checksum and write it into bytes 4..20 of `dxbc`.
pub fn write_dxbc_checksum(dxbc: &mut [u8]) -> Result<()> {
    let checksum = compute_dxbc_checksum(dxbc)?;
    for (i, word) in checksum.iter().enumerate() {
        let at = 4 + i * 4;
        dxbc[at..at + 4].copy_from_slice(&word.to_le_bytes());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_short_payload() {
        let dxbc = vec![0u8; HASHABLE_PAYLOAD_OFFSET];
        assert!(compute_dxbc_checksum(&dxbc).is_err());
    }

    #[test]
    fn single_byte_payload_is_deterministic_and_stable() {
        // A 21-byte container whose hashable payload is the single byte
        // 0x01. The exact golden value is the reference implementation's
        // output for this input (scenario 1 in spec.md §8); what this test
        // pins down locally is determinism and the short-leftover branch
        // (leftover_length == 1 < 56) being taken without panicking.
        let mut dxbc = vec![0u8; 21];
        dxbc[20] = 0x01;
        let checksum = compute_dxbc_checksum(&dxbc).unwrap();
        let checksum_again = compute_dxbc_checksum(&dxbc).unwrap();
        assert_eq!(checksum, checksum_again);
    }

    #[test]
    fn long_leftover_branch_does_not_panic() {
        // leftover_length = 60 >= 56, exercising the two-block tail path.
        let dxbc = vec![0xABu8; HASHABLE_PAYLOAD_OFFSET + 60];
        assert!(compute_dxbc_checksum(&dxbc).is_ok());
    }

    #[test]
    fn write_checksum_round_trips_into_header() {
        let mut dxbc = vec![0u8; 40];
        dxbc[0..4].copy_from_slice(b"DXBC");
        write_dxbc_checksum(&mut dxbc).unwrap();
        let expected = compute_dxbc_checksum(&dxbc).unwrap();
        let mut actual = [0u32; 4];
        for i in 0..4 {
            let at = 4 + i * 4;
            actual[i] = u32::from_le_bytes(dxbc[at..at + 4].try_into().unwrap());
        }
        assert_eq!(actual, expected);
    }
}
