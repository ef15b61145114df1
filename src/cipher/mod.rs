//! Stream deobfuscation.
//!
//! Tape loaders XOR'ed the program as it was written to tape. Each loader
//! family used its own self-keyed scheme:
//! - [`ChainedXor`]: key is the previous ciphertext byte (NONTAMA)
//! - [`AddressKeyed`]: key is the low byte of the load address, with a
//!   Hamming-weight check byte every 256 bytes (M loader)

pub mod address_keyed;
pub mod chained;

pub use address_keyed::AddressKeyed;
pub use chained::{ChainedXor, NONTAMA_SEED};

use crate::error::Result;

/// Output of one decode pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deobfuscated {
    /// Recovered plaintext, exactly the requested length
    pub plaintext: Vec<u8>,
    /// Input bytes consumed, including any check bytes
    pub consumed: usize,
}

/// A reversible tape obfuscation scheme.
///
/// Key state lives only inside one `decode` call, so a cipher value can be
/// reused and shared freely.
pub trait Cipher {
    /// Decode exactly `plain_len` plaintext bytes from the front of `input`.
    ///
    /// Trailing input is left untouched; [`Deobfuscated::consumed`] marks
    /// where it begins.
    fn decode(&self, input: &[u8], plain_len: usize) -> Result<Deobfuscated>;
}
