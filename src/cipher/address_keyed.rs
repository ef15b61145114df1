//! Address-keyed XOR with periodic Hamming-weight check bytes.

use super::{Cipher, Deobfuscated};
use crate::error::{Result, TranscodeError};

/// `plain[i] = cipher[i] ^ ((load_addr + i) & 0xFF)`.
///
/// Whenever the number of plaintext bytes still to come is a multiple of
/// 256, the next input byte is a check byte: the population count of every
/// plaintext bit since the previous check, mod 256. This includes the point
/// where the last byte has been produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressKeyed {
    /// Absolute address of the first plaintext byte
    pub load_addr: u16,
}

impl AddressKeyed {
    /// Create a cipher keyed from `load_addr`.
    pub fn new(load_addr: u16) -> Self {
        Self { load_addr }
    }

    fn key(&self, index: usize) -> u8 {
        (usize::from(self.load_addr).wrapping_add(index) & 0xFF) as u8
    }

    /// Inverse of [`Cipher::decode`], for building synthetic tapes.
    #[cfg(test)]
    pub(crate) fn obfuscate(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(plaintext.len() + plaintext.len() / 256 + 1);
        let mut bitsum = 0u8;
        for (i, &plain) in plaintext.iter().enumerate() {
            out.push(plain ^ self.key(i));
            bitsum = bitsum.wrapping_add(plain.count_ones() as u8);
            if (plaintext.len() - (i + 1)) & 0xFF == 0 {
                out.push(bitsum);
                bitsum = 0;
            }
        }
        out
    }
}

impl Cipher for AddressKeyed {
    fn decode(&self, input: &[u8], plain_len: usize) -> Result<Deobfuscated> {
        let mut plaintext = Vec::with_capacity(plain_len);
        let mut pos = 0usize;
        let mut bitsum = 0u8;

        let next = |pos: &mut usize| -> Result<u8> {
            let byte = input.get(*pos).copied().ok_or(TranscodeError::TruncatedInput {
                offset: *pos,
                expected: 1,
                actual: 0,
            })?;
            *pos += 1;
            Ok(byte)
        };

        while plaintext.len() < plain_len {
            let plain = next(&mut pos)? ^ self.key(plaintext.len());
            plaintext.push(plain);
            bitsum = bitsum.wrapping_add(plain.count_ones() as u8);

            if (plain_len - plaintext.len()) & 0xFF == 0 {
                let check = next(&mut pos)?;
                if check != bitsum {
                    return Err(TranscodeError::ChecksumMismatch {
                        position: plaintext.len(),
                        expected: check,
                        computed: bitsum,
                    });
                }
                bitsum = 0;
            }
        }

        Ok(Deobfuscated {
            plaintext,
            consumed: pos,
        })
    }
}
