//! MSX Disk BASIC BLOAD containers.
//!
//! Raw layouts:
//! - single file: `0xFE`, start, stop, entry, payload
//! - multi-segment: `0xFE`, start, stop, payload (the entry lives in the
//!   `_XXXX_YYYY_ZZZZ` file name suffix)
//!
//! The cassette-wrapped layout puts a CAS BLOAD header block with a 6-byte
//! name in front of the single-file header and ends with a zero footer.
//! Addresses are little-endian; stop is always exclusive.

use super::magic;
use crate::error::{Result, TranscodeError};
use crate::types::AddressTriple;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

/// Width of the cassette name field.
pub const CAS_NAME_LEN: usize = 6;

/// Raw BLOAD header variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerLayout {
    /// Magic, start, stop, entry
    SingleFile,
    /// Magic, start, stop; entry kept out of band
    MultiSegment,
}

impl ContainerLayout {
    /// Header size in bytes, magic included.
    pub const fn header_len(self) -> usize {
        match self {
            ContainerLayout::SingleFile => 7,
            ContainerLayout::MultiSegment => 5,
        }
    }
}

/// A parsed raw BLOAD file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloadFile<'a> {
    /// Layout the header was read with
    pub layout: ContainerLayout,
    /// Load start address
    pub start: u16,
    /// Exclusive stop address
    pub stop_exclusive: u16,
    /// Entry address, when the layout stores one
    pub entry: Option<u16>,
    /// Payload bytes
    pub payload: &'a [u8],
}

impl<'a> BloadFile<'a> {
    /// Parse a raw BLOAD file, picking the layout whose header length
    /// accounts for the file size.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        read_bload(data, ContainerLayout::SingleFile)
            .or_else(|_| read_bload(data, ContainerLayout::MultiSegment))
    }

    /// Address triple, using `entry` when the header does not carry one.
    pub fn addresses(&self, entry: Option<u16>) -> Result<AddressTriple> {
        let entry = self.entry.or(entry).ok_or_else(|| {
            invalid("multi-segment container needs an entry address from its file name")
        })?;
        AddressTriple::new(self.start, self.stop_exclusive, entry)
            .map_err(|err| invalid(err.to_string()))
    }
}

fn invalid(message: impl Into<String>) -> TranscodeError {
    TranscodeError::InvalidContainer {
        message: message.into(),
    }
}

fn check_payload(payload: &[u8], addresses: &AddressTriple) -> Result<()> {
    if payload.len() != addresses.len() {
        return Err(invalid(format!(
            "payload is {} bytes but {} covers {}",
            payload.len(),
            addresses,
            addresses.len()
        )));
    }
    Ok(())
}

fn write_header(out: &mut Vec<u8>, addresses: &AddressTriple, entry: bool) -> Result<()> {
    out.write_u16::<LittleEndian>(addresses.start)?;
    out.write_u16::<LittleEndian>(addresses.stop_exclusive)?;
    if entry {
        out.write_u16::<LittleEndian>(addresses.entry)?;
    }
    Ok(())
}

/// Serialize a payload as a raw BLOAD file.
pub fn write_bload(
    payload: &[u8],
    addresses: &AddressTriple,
    layout: ContainerLayout,
) -> Result<Vec<u8>> {
    check_payload(payload, addresses)?;
    let mut out = Vec::with_capacity(layout.header_len() + payload.len());
    out.push(magic::BLOAD);
    write_header(&mut out, addresses, layout == ContainerLayout::SingleFile)?;
    out.extend_from_slice(payload);
    Ok(out)
}

/// Serialize a payload as a cassette-wrapped BLOAD.
///
/// `name` is in the MSX charset; longer names are truncated and shorter
/// ones padded with spaces.
pub fn write_cas_bload(payload: &[u8], addresses: &AddressTriple, name: &[u8]) -> Result<Vec<u8>> {
    check_payload(payload, addresses)?;
    let mut out = Vec::with_capacity(
        2 * magic::CAS_BLOCK.len() + magic::CAS_BLOAD_HEADER.len() + CAS_NAME_LEN + 6
            + payload.len()
            + magic::CAS_BLOAD_FOOTER.len(),
    );
    out.extend_from_slice(&magic::CAS_BLOCK);
    out.extend_from_slice(&magic::CAS_BLOAD_HEADER);
    let name = &name[..name.len().min(CAS_NAME_LEN)];
    out.extend_from_slice(name);
    out.resize(out.len() + CAS_NAME_LEN - name.len(), b' ');
    out.extend_from_slice(&magic::CAS_BLOCK);
    write_header(&mut out, addresses, true)?;
    out.extend_from_slice(payload);
    out.extend_from_slice(&magic::CAS_BLOAD_FOOTER);
    Ok(out)
}

/// Parse a raw BLOAD file written with `layout`.
pub fn read_bload(data: &[u8], layout: ContainerLayout) -> Result<BloadFile<'_>> {
    let header_len = layout.header_len();
    if data.len() < header_len {
        return Err(invalid(format!(
            "{} bytes is shorter than the {header_len}-byte header",
            data.len()
        )));
    }
    if data[0] != magic::BLOAD {
        return Err(invalid(format!(
            "magic byte is 0x{:02X}, expected 0x{:02X}",
            data[0],
            magic::BLOAD
        )));
    }

    let start = LittleEndian::read_u16(&data[1..3]);
    let stop_exclusive = LittleEndian::read_u16(&data[3..5]);
    let entry = (layout == ContainerLayout::SingleFile).then(|| LittleEndian::read_u16(&data[5..7]));
    if start >= stop_exclusive {
        return Err(invalid(format!(
            "start 0x{start:04X} is not below stop 0x{stop_exclusive:04X}"
        )));
    }

    let payload = &data[header_len..];
    let expected = usize::from(stop_exclusive - start);
    if payload.len() != expected {
        return Err(invalid(format!(
            "{layout:?} payload is {} bytes, header declares {expected}",
            payload.len()
        )));
    }

    Ok(BloadFile {
        layout,
        start,
        stop_exclusive,
        entry,
        payload,
    })
}

/// Parse the trailing `_XXXX_YYYY_ZZZZ` address suffix of a file stem.
///
/// Returns the stem without the suffix and the start, stop and entry
/// addresses, or `None` when the stem does not end in three hex fields.
pub fn parse_address_suffix(file_stem: &str) -> Option<(&str, [u16; 3])> {
    let mut parts = file_stem.rsplitn(4, '_');
    let mut fields = [0u16; 3];
    for slot in fields.iter_mut().rev() {
        let part = parts.next()?;
        if part.len() != 4 {
            return None;
        }
        *slot = u16::from_str_radix(part, 16).ok()?;
    }
    let prefix = parts.next()?;
    Some((prefix, fields))
}
