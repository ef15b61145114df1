//! Hudson Soft NONTAMA loader (NEC PC-6001 mkII, P6/P6T tape images).
//!
//! The payload follows `0xFF "NONTAMA"` and a header of three little-endian
//! words: start, stop and entry. The stop address is inclusive. The payload
//! is chained-XOR obfuscated starting from seed 0xA3.
//!
//! At least one title (Itasundorious) was recorded with text already
//! corrupted in RAM; those bytes decode exactly as they were shipped.

use super::SegmentLoader;
use crate::cipher::{ChainedXor, Cipher};
use crate::error::Result;
use crate::formats::{self, hex, magic};
use crate::types::{AddressTriple, DecodedSegment, LoaderFamily};

/// Size of the start / stop / entry header.
pub const HEADER_LEN: usize = 6;

/// NONTAMA segment loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nontama;

impl SegmentLoader for Nontama {
    fn family(&self) -> LoaderFamily {
        LoaderFamily::Nontama
    }

    fn find_marker(&self, image: &[u8]) -> Option<usize> {
        formats::find(image, &magic::NONTAMA)
    }

    fn decode_at<'a>(&self, image: &'a [u8], marker: usize) -> Result<DecodedSegment<'a>> {
        let header_at = marker + magic::NONTAMA.len();
        let [start, stop_inclusive, entry] = formats::read_u16_fields::<3>(image, header_at)?;
        let addresses = AddressTriple::from_inclusive_stop(start, stop_inclusive, entry)
            .map_err(|err| err.rebase(header_at))?;

        let body_at = header_at + HEADER_LEN;
        let out = ChainedXor::nontama()
            .decode(&image[body_at..], addresses.len())
            .map_err(|err| err.rebase(body_at))?;

        Ok(DecodedSegment {
            family: LoaderFamily::Nontama,
            offset: marker,
            addresses,
            payload: out.plaintext,
            load_name: hex::recover_load_name(&image[..marker]),
            remainder: &image[body_at + out.consumed..],
        })
    }
}
