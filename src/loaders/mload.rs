//! Hudson Soft / Honeybee Soft "M" loader (MSX CAS tape images).
//!
//! Layout, each block introduced by the CAS block sentinel:
//! - optional ASCII BASIC pre-loader (`0xEA` header block + text block),
//!   which may carry the hex-record loader that announces the load name
//! - BLOAD header block: ten `0xD0` bytes and a 6-byte name
//! - the BLOADed machine-code loader body
//! - data block: payload size and load address (little-endian words), the
//!   address-keyed ciphertext with its check bytes, then the entry address
//!
//! The stop address is derived as `load + size` and is therefore exclusive.

use super::SegmentLoader;
use crate::cipher::{AddressKeyed, Cipher};
use crate::error::{Result, TranscodeError};
use crate::formats::{self, hex, magic};
use crate::types::{AddressTriple, DecodedSegment, LoaderFamily};

/// Width of the name field in a CAS BLOAD header block.
pub const HEADER_NAME_LEN: usize = 6;

/// M loader segment loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct MLoader;

/// Name stored in the CAS BLOAD header block starting at `name_at`.
fn header_name(image: &[u8], name_at: usize) -> Option<Vec<u8>> {
    let field = &image[name_at..];
    let field = &field[field.iter().take_while(|&&b| b == 0xD0).count()..];
    let block_end = formats::find(field, &magic::CAS_BLOCK).unwrap_or(field.len());
    let field = &field[..block_end.min(HEADER_NAME_LEN)];
    let len = field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    (len > 0).then(|| field[..len].to_vec())
}

/// Offset just past the next CAS block sentinel at or after `from`.
fn next_block(image: &[u8], from: usize, what: &str) -> Result<usize> {
    formats::find(&image[from..], &magic::CAS_BLOCK)
        .map(|pos| from + pos + magic::CAS_BLOCK.len())
        .ok_or_else(|| TranscodeError::malformed(from, format!("missing {what} block")))
}

impl SegmentLoader for MLoader {
    fn family(&self) -> LoaderFamily {
        LoaderFamily::MLoader
    }

    fn find_marker(&self, image: &[u8]) -> Option<usize> {
        formats::find(image, &magic::CAS_BLOAD_HEADER)
    }

    fn decode_at<'a>(&self, image: &'a [u8], marker: usize) -> Result<DecodedSegment<'a>> {
        let name_at = marker + magic::CAS_BLOAD_HEADER.len();
        let body_at = next_block(image, name_at, "loader body")?;
        let data_at = next_block(image, body_at, "data")?;

        let [size, load] = formats::read_u16_fields::<2>(image, data_at)?;
        let stop = load.checked_add(size).ok_or_else(|| {
            TranscodeError::malformed(
                data_at,
                format!("payload of 0x{size:04X} bytes at 0x{load:04X} passes 0xFFFF"),
            )
        })?;

        let cipher_at = data_at + 4;
        let out = AddressKeyed::new(load)
            .decode(&image[cipher_at..], usize::from(size))
            .map_err(|err| err.rebase(cipher_at))?;

        let entry_at = cipher_at + out.consumed;
        let entry = formats::read_u16_le(image, entry_at)?;
        let addresses =
            AddressTriple::for_loader(load, stop, entry).map_err(|err| err.rebase(data_at))?;

        let load_name = hex::recover_load_name(&image[..marker])
            .or_else(|| header_name(image, name_at));

        Ok(DecodedSegment {
            family: LoaderFamily::MLoader,
            offset: marker,
            addresses,
            payload: out.plaintext,
            load_name,
            remainder: &image[entry_at + 2..],
        })
    }
}
