//! Tape Transcoder - Recovery of Obfuscated 8-bit Tape Images
//!
//! This library recovers program data and metadata from tape and cassette
//! images written by 1980s Japanese distribution tools, and converts text
//! between Unicode and the MSX 8-bit character set.
//!
//! # Features
//!
//! - **Loader Families**: Hudson Soft NONTAMA (PC-6001 mkII) and the
//!   Hudson / Honeybee Soft "M" loader (MSX CAS)
//! - **Deobfuscation**: Chained XOR and address-keyed XOR with check bytes
//! - **Load Names**: Recovered from hex-record loaders embedded in the tape
//! - **MSX Charset**: Deterministic decode with a round-trip guarantee,
//!   forgiving encode with an explicit normalization fallback list
//! - **Containers**: Raw and cassette-wrapped BLOAD files, paged cartridge ROMs
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tape_transcoder::{extract_file, ExtractOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     for segment in extract_file("hero.cas", &ExtractOptions::new().with_cassette())? {
//!         println!("{}: {}", segment.report.index, segment.report.addresses);
//!         for file in &segment.files {
//!             std::fs::write(&file.name, &file.data)?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod charset;
pub mod cipher;
pub mod error;
pub mod formats;
pub mod formatter;
pub mod loaders;
pub mod types;

pub use error::{Result, TranscodeError};
pub use formats::bload::{BloadFile, ContainerLayout};
pub use types::{
    AddressTriple, CodecOptions, ControlPolicy, DecodedSegment, ExtractOptions,
    ExtractedSegment, LoaderFamily, OutputFile, SegmentReport,
};

use formats::{bload, rom};
use std::path::Path;
use tracing::debug;

/// Decode every segment of a tape image.
///
/// With `family` unset, the family is detected from the markers present.
pub fn decode_bytes(image: &[u8], family: Option<LoaderFamily>) -> Result<Vec<DecodedSegment<'_>>> {
    match family {
        Some(family) => loaders::decode_image(image, family),
        None => loaders::decode_image_auto(image),
    }
}

/// Decode a segment's load name from the MSX charset.
pub fn display_name(segment: &DecodedSegment<'_>, options: &CodecOptions) -> Result<Option<String>> {
    segment
        .load_name
        .as_deref()
        .map(|name| charset::decode(name, options))
        .transpose()
}

/// Base of the output file names for one segment:
/// `{stem}[_{index}][_{name}]`, the index only for multi-segment images.
pub fn output_base(stem: &str, index: usize, count: usize, name: Option<&str>) -> String {
    let mut base = stem.to_string();
    if count > 1 {
        base.push_str(&format!("_{index}"));
    }
    if let Some(name) = name.filter(|name| !name.is_empty()) {
        base.push('_');
        base.push_str(&charset::filesystem_safe(name));
    }
    base
}

/// Decode a tape image and serialize every segment.
///
/// `stem` names the outputs. Images holding more than one segment use the
/// multi-segment container layout.
pub fn extract_bytes(image: &[u8], stem: &str, options: &ExtractOptions) -> Result<Vec<ExtractedSegment>> {
    let segments = decode_bytes(image, options.family)?;
    let count = segments.len();
    let layout = if count > 1 {
        ContainerLayout::MultiSegment
    } else {
        ContainerLayout::SingleFile
    };

    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let name = display_name(segment, &options.codec)
                .map_err(|err| err.in_segment(index, segment.offset))?;
            let base = output_base(stem, index, count, name.as_deref());
            let suffix = segment.addresses.file_suffix();

            let mut files = vec![OutputFile {
                name: format!("{base}_{suffix}.bin"),
                data: bload::write_bload(&segment.payload, &segment.addresses, layout)?,
            }];
            if options.cassette {
                let cas_name = segment.load_name.as_deref().unwrap_or_default();
                files.push(OutputFile {
                    name: format!("{base}_{suffix}_bin.cas"),
                    data: bload::write_cas_bload(&segment.payload, &segment.addresses, cas_name)?,
                });
            }

            let mut report = SegmentReport::new(index, segment, name);
            report.outputs = files.iter().map(|file| file.name.clone()).collect();
            Ok(ExtractedSegment { report, files })
        })
        .collect()
}

/// Read and extract a tape image file; outputs are named after its stem.
pub fn extract_file<P: AsRef<Path>>(path: P, options: &ExtractOptions) -> Result<Vec<ExtractedSegment>> {
    let path = path.as_ref();
    let image = std::fs::read(path)?;
    let stem = file_stem(path);
    debug!(path = %path.display(), len = image.len(), "extracting");
    extract_bytes(&image, &stem, options)
}

/// Build a paged cartridge ROM from a raw BLOAD file.
///
/// A `_XXXX_YYYY_ZZZZ` suffix on `stem` supplies the entry address for
/// multi-segment containers and must agree with the header when present.
pub fn build_rom_bytes(data: &[u8], stem: &str) -> Result<OutputFile> {
    let file = BloadFile::parse(data)?;
    let suffix = bload::parse_address_suffix(stem).map(|(_, fields)| fields);

    if let Some([start, stop, entry]) = suffix {
        let header_matches = start == file.start
            && stop == file.stop_exclusive
            && file.entry.map_or(true, |e| e == entry);
        if !header_matches {
            return Err(TranscodeError::InvalidContainer {
                message: format!("file name suffix {start:04X}_{stop:04X}_{entry:04X} and BLOAD header do not match"),
            });
        }
    }

    let addresses = file.addresses(suffix.map(|[_, _, entry]| entry))?;
    Ok(OutputFile {
        name: rom::rom_file_name(stem),
        data: rom::build_paged_rom(file.payload, &addresses)?,
    })
}

/// Read a raw BLOAD file and build its cartridge ROM.
pub fn build_rom_file<P: AsRef<Path>>(path: P) -> Result<OutputFile> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    build_rom_bytes(&data, &file_stem(path))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::{mload, nontama};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_version() {
        let v = version();
        assert!(!v.is_empty());
    }

    #[test]
    fn test_output_base() {
        assert_eq!(output_base("tape", 0, 1, None), "tape");
        assert_eq!(output_base("tape", 1, 3, Some("ﾊﾄﾞｿﾝ")), "tape_1_ﾊﾄﾞｿﾝ");
        assert_eq!(output_base("tape", 0, 1, Some("A/B")), "tape_A_B");
        assert_eq!(output_base("tape", 0, 1, Some("")), "tape");
    }

    #[test]
    fn test_extract_nontama() {
        let payload = b"\xC3\x03\x80PROGRAM";
        let image = nontama::tests::obfuscated_segment(0x8000, 0x8000, payload);

        let extracted = extract_bytes(&image, "hero", &ExtractOptions::new()).unwrap();
        assert_eq!(extracted.len(), 1);
        let segment = &extracted[0];
        assert_eq!(segment.report.family, LoaderFamily::Nontama);
        assert_eq!(segment.report.load_name, None);
        assert_eq!(segment.files.len(), 1);
        assert_eq!(segment.files[0].name, "hero_8000_800A_8000.bin");
        assert_eq!(&segment.files[0].data[..7], &[0xFE, 0x00, 0x80, 0x0A, 0x80, 0x00, 0x80]);
        assert_eq!(&segment.files[0].data[7..], payload);
    }

    #[test]
    fn test_extract_mload_with_cassette() {
        let payload = vec![0x11; 300];
        let image = mload::tests::cas_image(b"\xCA\xC4\xDE", 0x9000, 0x9000, &payload, b"");
        let options = ExtractOptions::new()
            .with_family(LoaderFamily::MLoader)
            .with_cassette();

        let extracted = extract_bytes(&image, "tape", &options).unwrap();
        let segment = &extracted[0];
        assert_eq!(segment.report.load_name.as_deref(), Some("ﾊﾄﾞ"));
        assert_eq!(
            segment.report.outputs,
            vec![
                "tape_ﾊﾄﾞ_9000_912C_9000.bin".to_string(),
                "tape_ﾊﾄﾞ_9000_912C_9000_bin.cas".to_string(),
            ]
        );
        let cas = &segment.files[1].data;
        assert_eq!(&cas[18..24], b"\xCA\xC4\xDE   ");
        assert_eq!(cas.len(), 8 + 10 + 6 + 8 + 6 + 300 + 10);
    }

    #[test]
    fn test_extract_multi_segment_layout() {
        let mut image = nontama::tests::obfuscated_segment(0x8000, 0x8000, b"ONE");
        image.extend(nontama::tests::obfuscated_segment(0xA000, 0xA001, b"TWO"));

        let extracted = extract_bytes(&image, "tape", &ExtractOptions::new()).unwrap();
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[1].files[0].name, "tape_1_A000_A003_A001.bin");
        assert_eq!(
            extracted[1].files[0].data,
            vec![0xFE, 0x00, 0xA0, 0x03, 0xA0, b'T', b'W', b'O']
        );
    }

    #[test]
    fn test_extract_unknown_image() {
        assert!(extract_bytes(b"no markers", "x", &ExtractOptions::new()).is_err());
    }

    #[test]
    fn test_build_rom_from_extracted() {
        let image = nontama::tests::obfuscated_segment(0x8000, 0x8001, b"ABCD");
        let extracted = extract_bytes(&image, "hero", &ExtractOptions::new()).unwrap();
        let bin = &extracted[0].files[0];
        let stem = bin.name.trim_end_matches(".bin");

        let rom = build_rom_bytes(&bin.data, stem).unwrap();
        assert_eq!(rom.name, "hero_warrior.rom");
        assert_eq!(rom.data.len(), 2 * rom::ROM_PAGE_SIZE);
        assert_eq!(&rom.data[0x2047..0x204B], b"ABCD");
    }

    #[test]
    fn test_build_rom_suffix_mismatch() {
        let addresses = AddressTriple::new(0x8000, 0x8002, 0x8000).unwrap();
        let data = bload::write_bload(b"AB", &addresses, ContainerLayout::MultiSegment).unwrap();
        assert!(build_rom_bytes(&data, "t_8000_8002_8000").is_ok());
        assert!(build_rom_bytes(&data, "t_8000_8003_8000").is_err());
        assert!(build_rom_bytes(&data, "t").is_err());
    }

    #[test]
    fn test_extract_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hero.p6t");
        std::fs::write(&path, nontama::tests::obfuscated_segment(0xC000, 0xC000, b"XY")).unwrap();

        let extracted = extract_file(&path, &ExtractOptions::new()).unwrap();
        assert_eq!(extracted[0].files[0].name, "hero_C000_C002_C000.bin");
        assert!(matches!(
            extract_file(dir.path().join("missing.p6t"), &ExtractOptions::new()),
            Err(TranscodeError::Io(_))
        ));
    }
}
