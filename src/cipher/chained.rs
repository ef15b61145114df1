//! Chained XOR, keyed by the previous ciphertext byte.

use super::{Cipher, Deobfuscated};
use crate::error::{Result, TranscodeError};

/// Seed used by the NONTAMA loader for the first byte.
pub const NONTAMA_SEED: u8 = 0xA3;

/// `plain[i] = cipher[i] ^ cipher[i - 1]`, with `seed` standing in for
/// `cipher[-1]`.
///
/// Self-synchronizing: a damaged ciphertext byte corrupts only its own
/// plaintext byte and the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainedXor {
    /// Key for the first byte
    pub seed: u8,
}

impl ChainedXor {
    /// Create a cipher with an explicit seed.
    pub fn new(seed: u8) -> Self {
        Self { seed }
    }

    /// Cipher used by the NONTAMA loader.
    pub fn nontama() -> Self {
        Self::new(NONTAMA_SEED)
    }
}

impl Cipher for ChainedXor {
    fn decode(&self, input: &[u8], plain_len: usize) -> Result<Deobfuscated> {
        let ciphertext = input.get(..plain_len).ok_or(TranscodeError::TruncatedInput {
            offset: 0,
            expected: plain_len,
            actual: input.len(),
        })?;

        let mut key = self.seed;
        let plaintext = ciphertext
            .iter()
            .map(|&byte| {
                let plain = byte ^ key;
                key = byte;
                plain
            })
            .collect();

        Ok(Deobfuscated {
            plaintext,
            consumed: plain_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_bytes() {
        let out = ChainedXor::nontama().decode(&[0x13, 0x33, 0x60], 3).unwrap();
        assert_eq!(
            out.plaintext,
            vec![0x13 ^ 0xA3, 0x33 ^ 0x13, 0x60 ^ 0x33]
        );
        assert_eq!(out.consumed, 3);
    }

    #[test]
    fn test_trailing_input_untouched() {
        let out = ChainedXor::new(0).decode(&[1, 2, 3, 4, 5], 2).unwrap();
        assert_eq!(out.plaintext, vec![1, 3]);
        assert_eq!(out.consumed, 2);
    }

    #[test]
    fn test_corruption_stays_local() {
        let clean = [0x52, 0x13, 0x33, 0x60, 0x40, 0x15];
        let mut damaged = clean;
        damaged[2] ^= 0xFF;

        let a = ChainedXor::nontama().decode(&clean, clean.len()).unwrap();
        let b = ChainedXor::nontama().decode(&damaged, damaged.len()).unwrap();
        let differing: Vec<usize> = (0..clean.len())
            .filter(|&i| a.plaintext[i] != b.plaintext[i])
            .collect();
        assert_eq!(differing, vec![2, 3]);
    }

    #[test]
    fn test_truncated() {
        let err = ChainedXor::nontama().decode(&[1, 2], 3).unwrap_err();
        assert!(matches!(
            err,
            TranscodeError::TruncatedInput {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }
}
