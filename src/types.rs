//! Core types for the tape transcoder.
//!
//! This module defines the address triples carried by tape headers, the
//! decoded segment produced by one deobfuscation pass, the loader families,
//! and the explicit codec options passed to every charset call.

use crate::error::{Result, TranscodeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Load start, exclusive stop and entry address of one segment.
///
/// Tape headers disagree on whether the stop address is inclusive, so the
/// triple always stores the exclusive form and the constructors normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressTriple {
    /// First address written
    pub start: u16,
    /// One past the last address written
    pub stop_exclusive: u16,
    /// Execution entry point
    pub entry: u16,
}

impl AddressTriple {
    /// Create a triple, checking `start < stop_exclusive`.
    pub fn new(start: u16, stop_exclusive: u16, entry: u16) -> Result<Self> {
        if start >= stop_exclusive {
            return Err(TranscodeError::malformed(
                0,
                format!("start 0x{start:04X} is not below stop 0x{stop_exclusive:04X}"),
            ));
        }
        Ok(Self {
            start,
            stop_exclusive,
            entry,
        })
    }

    /// Create a triple read from a loader header, which must also satisfy
    /// `start <= entry < stop_exclusive`.
    pub fn for_loader(start: u16, stop_exclusive: u16, entry: u16) -> Result<Self> {
        let triple = Self::new(start, stop_exclusive, entry)?;
        if !triple.contains(entry) {
            return Err(TranscodeError::malformed(
                0,
                format!(
                    "entry 0x{entry:04X} outside 0x{start:04X}..0x{stop_exclusive:04X}"
                ),
            ));
        }
        Ok(triple)
    }

    /// Create a loader triple from a header whose stop address is inclusive.
    pub fn from_inclusive_stop(start: u16, stop_inclusive: u16, entry: u16) -> Result<Self> {
        let stop_exclusive = stop_inclusive.checked_add(1).ok_or_else(|| {
            TranscodeError::malformed(0, "inclusive stop 0xFFFF has no 16-bit exclusive form")
        })?;
        Self::for_loader(start, stop_exclusive, entry)
    }

    /// Number of payload bytes covered by the triple.
    pub fn len(&self) -> usize {
        usize::from(self.stop_exclusive - self.start)
    }

    /// Always false; a valid triple covers at least one byte.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `addr` lies inside the loaded range.
    pub fn contains(&self, addr: u16) -> bool {
        (self.start..self.stop_exclusive).contains(&addr)
    }

    /// `XXXX_YYYY_ZZZZ` suffix used in output file names.
    pub fn file_suffix(&self) -> String {
        format!(
            "{:04X}_{:04X}_{:04X}",
            self.start, self.stop_exclusive, self.entry
        )
    }
}

impl fmt::Display for AddressTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04X}..0x{:04X} entry 0x{:04X}",
            self.start, self.stop_exclusive, self.entry
        )
    }
}

/// Vendor tape-loading convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderFamily {
    /// Hudson Soft PC-6001 mkII loader, chained XOR with a fixed seed
    Nontama,
    /// Hudson / Honeybee Soft MSX "M" loader, address-keyed XOR with check bytes
    MLoader,
}

impl LoaderFamily {
    /// Human-readable loader name.
    pub fn name(&self) -> &'static str {
        match self {
            LoaderFamily::Nontama => "NONTAMA (PC-6001 mkII)",
            LoaderFamily::MLoader => "M loader (MSX)",
        }
    }
}

impl fmt::Display for LoaderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderFamily::Nontama => write!(f, "nontama"),
            LoaderFamily::MLoader => write!(f, "mload"),
        }
    }
}

/// One obfuscated, address-tagged region recovered from a tape image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSegment<'a> {
    /// Loader family that produced the segment
    pub family: LoaderFamily,
    /// Offset of the segment's start marker in the scanned image
    pub offset: usize,
    /// Normalized address triple
    pub addresses: AddressTriple,
    /// Deobfuscated payload, exactly `addresses.len()` bytes
    pub payload: Vec<u8>,
    /// Load name in native charset bytes, if one was recovered
    pub load_name: Option<Vec<u8>>,
    /// Unconsumed tail of the source image
    pub remainder: &'a [u8],
}

/// Which raw control bytes the charset decoder emits as their own codepoint
/// instead of the table's display glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlPolicy {
    /// Decode every byte through the table
    None,
    /// NUL, CR, LF, SUB and DEL
    #[default]
    Minimal,
    /// All of 0x00..=0x1F plus DEL
    FullAscii,
}

impl ControlPolicy {
    /// Whether `byte` is preserved as a raw control codepoint.
    pub fn preserves(&self, byte: u8) -> bool {
        match self {
            ControlPolicy::None => false,
            ControlPolicy::Minimal => matches!(byte, 0x00 | 0x0D | 0x0A | 0x1A | 0x7F),
            ControlPolicy::FullAscii => byte < 0x20 || byte == 0x7F,
        }
    }
}

/// Options for charset decode and encode calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    /// Allow the normalization fallback chain when encoding
    pub try_harder: bool,
    /// Control bytes kept raw when decoding
    pub preserve: ControlPolicy,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecOptions {
    /// Forgiving encode, minimal control preservation.
    pub fn new() -> Self {
        Self {
            try_harder: true,
            preserve: ControlPolicy::Minimal,
        }
    }

    /// Exact table coverage only; encoding never falls back to normalization.
    pub fn strict() -> Self {
        Self {
            try_harder: false,
            preserve: ControlPolicy::Minimal,
        }
    }

    /// Same settings with a different control policy.
    pub fn preserving(self, preserve: ControlPolicy) -> Self {
        Self { preserve, ..self }
    }
}

/// Printable summary of one decoded segment and the files written for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentReport {
    /// Index of the segment inside its image
    pub index: usize,
    /// Loader family
    pub family: LoaderFamily,
    /// Offset of the start marker
    pub offset: usize,
    /// Address triple
    pub addresses: AddressTriple,
    /// Payload length in bytes
    pub payload_len: usize,
    /// Decoded load name, if any
    pub load_name: Option<String>,
    /// Files written for this segment
    pub outputs: Vec<String>,
}

impl SegmentReport {
    /// Build a report from a decoded segment and its display name.
    pub fn new(index: usize, segment: &DecodedSegment<'_>, load_name: Option<String>) -> Self {
        Self {
            index,
            family: segment.family,
            offset: segment.offset,
            addresses: segment.addresses,
            payload_len: segment.payload.len(),
            load_name,
            outputs: Vec::new(),
        }
    }
}

/// Options for extracting segments from a tape image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Loader family, or `None` to detect it from the image markers
    pub family: Option<LoaderFamily>,
    /// Codec options used to decode load names
    pub codec: CodecOptions,
    /// Also produce cassette-wrapped containers
    pub cassette: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Auto-detected family, default codec options, raw containers only.
    pub fn new() -> Self {
        Self {
            family: None,
            codec: CodecOptions::new(),
            cassette: false,
        }
    }

    /// Force a loader family.
    pub fn with_family(self, family: LoaderFamily) -> Self {
        Self {
            family: Some(family),
            ..self
        }
    }

    /// Produce cassette-wrapped containers as well.
    pub fn with_cassette(self) -> Self {
        Self {
            cassette: true,
            ..self
        }
    }
}

/// A file to be written: name relative to the output directory and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// File name
    pub name: String,
    /// File contents
    pub data: Vec<u8>,
}

/// One extracted segment: its report and the containers built for it.
#[derive(Debug, Clone)]
pub struct ExtractedSegment {
    /// Summary, with `outputs` listing the file names
    pub report: SegmentReport,
    /// Serialized containers
    pub files: Vec<OutputFile>,
}
