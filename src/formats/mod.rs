//! Tape and container formats.
//!
//! This module provides:
//! - Embedded hex-record loader reconstruction (load name recovery)
//! - BLOAD and cassette-wrapped BLOAD containers
//! - Paged cartridge ROM images

pub mod bload;
pub mod hex;
pub mod rom;

use crate::error::{Result, TranscodeError};
use byteorder::{ByteOrder, LittleEndian};

/// Magic byte signatures found on tapes and in containers.
pub mod magic {
    /// NONTAMA loader payload marker: 0xFF "NONTAMA"
    pub const NONTAMA: [u8; 8] = [0xFF, b'N', b'O', b'N', b'T', b'A', b'M', b'A'];

    /// MSX CAS tape block sentinel
    pub const CAS_BLOCK: [u8; 8] = [0x1F, 0xA6, 0xDE, 0xBA, 0xCC, 0x13, 0x7D, 0x74];

    /// MSX CAS binary (BLOAD) file header block
    pub const CAS_BLOAD_HEADER: [u8; 10] = [0xD0; 10];

    /// MSX CAS ASCII text file header block
    pub const CAS_ASCII_HEADER: [u8; 10] = [0xEA; 10];

    /// Padding that ends a cassette-wrapped BLOAD
    pub const CAS_BLOAD_FOOTER: [u8; 10] = [0x00; 10];

    /// MSX Disk BASIC BLOAD data
    pub const BLOAD: u8 = 0xFE;
}

/// Find the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    memchr::memmem::find(haystack, needle)
}

/// Read bytes with bounds checking.
pub fn read_bytes(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    data.get(offset..offset.saturating_add(len))
        .ok_or(TranscodeError::TruncatedInput {
            offset,
            expected: len,
            actual: data.len().saturating_sub(offset),
        })
}

/// Read a little-endian u16.
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    read_bytes(data, offset, 2).map(LittleEndian::read_u16)
}

/// Read `N` consecutive little-endian u16 fields.
pub fn read_u16_fields<const N: usize>(data: &[u8], offset: usize) -> Result<[u16; N]> {
    let bytes = read_bytes(data, offset, 2 * N)?;
    let mut fields = [0u16; N];
    LittleEndian::read_u16_into(bytes, &mut fields);
    Ok(fields)
}
