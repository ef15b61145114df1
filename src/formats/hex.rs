//! Embedded hex-record loader reconstruction.
//!
//! Some tapes carry a small machine-code loader as Intel-HEX-like text in
//! front of the obfuscated payload. Rebuilding that loader's memory image
//! recovers the load name it prints (`Found:NAME`).

use memchr::memchr3;
use tracing::debug;

/// Intel HEX record types.
pub mod intel_hex {
    pub const DATA: u8 = 0x00;
    pub const EOF: u8 = 0x01;
}

/// Bytes that open the hex text region.
pub const TEXT_SENTINEL: [u8; 3] = *b"\r\n:";

/// Fill byte padding the end of an ASCII tape file.
pub const FILL_BYTE: u8 = 0x1A;

/// Marker preceding the load name inside the reconstructed loader.
pub const LOAD_NAME_MARKER: &[u8] = b"Found:";

/// Length, address and type fields plus checksum, in bytes.
const RECORD_OVERHEAD: usize = 5;

/// One hex-decoded record line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    /// Declared data length
    pub length: u8,
    /// Origin address
    pub address: u16,
    /// Record type
    pub record_type: u8,
    /// Data bytes actually present on the line
    pub data: Vec<u8>,
    /// Whether every decoded byte on the line sums to zero
    pub checksum_ok: bool,
}

impl HexRecord {
    /// Decode a record line. Returns `None` for lines that are not records
    /// at all: no leading colon, even length, too short, or non-hex digits.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let digits = line.strip_prefix(b":")?;
        if line.len() % 2 == 0 {
            return None;
        }
        let bytes = ::hex::decode(digits).ok()?;
        if bytes.len() < RECORD_OVERHEAD {
            return None;
        }

        let checksum_ok = bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)) == 0;
        Some(Self {
            length: bytes[0],
            address: u16::from_be_bytes([bytes[1], bytes[2]]),
            record_type: bytes[3],
            data: bytes[4..bytes.len() - 1].to_vec(),
            checksum_ok,
        })
    }
}

/// Sparse memory image rebuilt from records, addressed absolutely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconstructedImage {
    origin: usize,
    bytes: Vec<u8>,
}

impl ReconstructedImage {
    /// Create an empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the first byte, or `None` while empty.
    pub fn origin(&self) -> Option<usize> {
        (!self.bytes.is_empty()).then_some(self.origin)
    }

    /// Image contents from the origin on.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte at an absolute address, if covered.
    pub fn get(&self, addr: usize) -> Option<u8> {
        addr.checked_sub(self.origin)
            .and_then(|off| self.bytes.get(off))
            .copied()
    }

    /// Write `data` at `addr`. Earlier content at the same addresses is
    /// overwritten and gaps are zero-filled.
    pub fn merge(&mut self, addr: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if self.bytes.is_empty() {
            self.origin = addr;
            self.bytes = data.to_vec();
            return;
        }
        if addr < self.origin {
            let shift = self.origin - addr;
            self.bytes.splice(0..0, std::iter::repeat(0).take(shift));
            self.origin = addr;
        }
        let off = addr - self.origin;
        let end = off + data.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[off..end].copy_from_slice(data);
    }
}

/// Locate the hex text inside the bytes preceding a segment.
///
/// The text starts at [`TEXT_SENTINEL`] and runs to the first NUL, minus any
/// trailing [`FILL_BYTE`]s.
pub fn locate_text(region: &[u8]) -> Option<&[u8]> {
    let start = super::find(region, &TEXT_SENTINEL)?;
    let text = &region[start..];
    let text = match memchr::memchr(0x00, text) {
        Some(end) => &text[..end],
        None => text,
    };
    let trimmed = text.len() - text.iter().rev().take_while(|&&b| b == FILL_BYTE).count();
    Some(&text[..trimmed])
}

/// Rebuild the memory image described by hex record text.
pub fn reconstruct(text: &[u8]) -> ReconstructedImage {
    let mut image = ReconstructedImage::new();

    for (lineno, line) in text.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(record) = HexRecord::parse(line) else {
            continue;
        };

        if record.length == 0 || record.record_type == intel_hex::EOF {
            debug!(lineno, "end of hex records");
            break;
        }
        if record.record_type != intel_hex::DATA {
            debug!(lineno, record_type = record.record_type, "skipping record type");
            continue;
        }
        if usize::from(record.length) != record.data.len() {
            debug!(
                lineno,
                declared = record.length,
                actual = record.data.len(),
                "skipping record with wrong length"
            );
            continue;
        }
        if !record.checksum_ok {
            debug!(lineno, "skipping record with bad checksum");
            continue;
        }

        image.merge(usize::from(record.address), &record.data);
    }

    image
}

/// Find the load name the loader announces after [`LOAD_NAME_MARKER`].
pub fn extract_load_name(image: &[u8]) -> Option<Vec<u8>> {
    let start = super::find(image, LOAD_NAME_MARKER)? + LOAD_NAME_MARKER.len();
    let rest = &image[start..];
    let end = memchr3(0x00, b'\n', b'\r', rest).unwrap_or(rest.len());
    let name = trim_blanks(&rest[..end]);
    (!name.is_empty()).then(|| name.to_vec())
}

/// Recover the load name from the bytes preceding a segment marker.
pub fn recover_load_name(region: &[u8]) -> Option<Vec<u8>> {
    let text = locate_text(region)?;
    let image = reconstruct(text);
    let name = extract_load_name(image.as_bytes());
    if let Some(ref name) = name {
        debug!(
            origin = image.origin(),
            len = image.as_bytes().len(),
            name = %String::from_utf8_lossy(name),
            "recovered embedded loader name"
        );
    }
    name
}

fn trim_blanks(bytes: &[u8]) -> &[u8] {
    let is_blank = |b: &u8| *b == b' ' || *b == b'\t';
    let start = bytes.iter().position(|b| !is_blank(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_blank(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Encode one data record line, checksum included.
#[cfg(test)]
pub(crate) fn data_record(address: u16, data: &[u8]) -> String {
    let mut bytes = vec![data.len() as u8];
    bytes.extend_from_slice(&address.to_be_bytes());
    bytes.push(intel_hex::DATA);
    bytes.extend_from_slice(data);
    let sum = bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));
    bytes.push(sum.wrapping_neg());
    format!(":{}", ::hex::encode_upper(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_record() {
        let record = HexRecord::parse(b":0300300002337A1E").unwrap();
        assert_eq!(record.length, 3);
        assert_eq!(record.address, 0x0030);
        assert_eq!(record.record_type, intel_hex::DATA);
        assert_eq!(record.data, vec![0x02, 0x33, 0x7A]);
        assert!(record.checksum_ok);
    }

    #[test]
    fn test_parse_ignores_non_records() {
        assert!(HexRecord::parse(b"10 REM LOADER").is_none());
        assert!(HexRecord::parse(b":0300300002337A1").is_none());
        assert!(HexRecord::parse(b":03003000ZZ337A1E").is_none());
        assert!(HexRecord::parse(b":00").is_none());
    }

    #[test]
    fn test_generated_record_roundtrip() {
        let line = data_record(0xC000, b"ABC");
        let record = HexRecord::parse(line.as_bytes()).unwrap();
        assert_eq!(record.address, 0xC000);
        assert_eq!(record.data, b"ABC".to_vec());
        assert!(record.checksum_ok);
    }

    #[test]
    fn test_merge_overlap_later_wins() {
        let text = format!(
            "{}\r\n{}\r\n:00000001FF\r\n",
            data_record(0x8000, &[0xAA; 4]),
            data_record(0x8002, &[0xBB; 4])
        );
        let image = reconstruct(text.as_bytes());
        assert_eq!(image.origin(), Some(0x8000));
        assert_eq!(image.as_bytes(), &[0xAA, 0xAA, 0xBB, 0xBB, 0xBB, 0xBB]);
    }

    #[test]
    fn test_merge_prepend_and_gaps() {
        let mut image = ReconstructedImage::new();
        image.merge(0x8010, &[1, 2]);
        image.merge(0x800C, &[3]);
        image.merge(0x8014, &[4]);
        assert_eq!(image.origin(), Some(0x800C));
        assert_eq!(image.as_bytes(), &[3, 0, 0, 0, 1, 2, 0, 0, 4]);
        assert_eq!(image.get(0x8011), Some(2));
        assert_eq!(image.get(0x8000), None);
    }

    #[test]
    fn test_merge_prepend_overlapping() {
        let mut image = ReconstructedImage::new();
        image.merge(0x8002, &[1, 1, 1]);
        image.merge(0x8000, &[2, 2, 2]);
        assert_eq!(image.as_bytes(), &[2, 2, 2, 1, 1]);
    }

    #[test]
    fn test_record_rules() {
        let good = data_record(0x9000, b"OK");
        let mut bad_sum = data_record(0x9010, b"XX");
        bad_sum.replace_range(bad_sum.len() - 2.., "00");
        let text = [
            "garbage line".to_string(),
            bad_sum,
            ":02901002FFFF5E".to_string(),
            ":0490200041424200".to_string(),
            good,
            ":0000000000".to_string(),
            data_record(0x9000, b"NO"),
        ]
        .join("\r\n");

        let image = reconstruct(text.as_bytes());
        assert_eq!(image.origin(), Some(0x9000));
        assert_eq!(image.as_bytes(), b"OK");
    }

    #[test]
    fn test_eof_record_terminates() {
        let text = format!(
            "{}\r\n:00000001FF\r\n{}",
            data_record(0x4000, b"A"),
            data_record(0x4000, b"B")
        );
        assert_eq!(reconstruct(text.as_bytes()).as_bytes(), b"A");
    }

    #[test]
    fn test_locate_text() {
        let region = b"\x1f\xa6\xde\xba\xcc\x13\x7d\x74\r\n:00000001FF\r\n\x1a\x1a\x1a";
        assert_eq!(locate_text(region), Some(&b"\r\n:00000001FF\r\n"[..]));
        assert_eq!(locate_text(b"no text here"), None);
        assert_eq!(locate_text(b"\r\n:0100\x00junk"), Some(&b"\r\n:0100"[..]));
    }

    #[test]
    fn test_extract_load_name() {
        assert_eq!(
            extract_load_name(b"\x00\x01Found:  MYGAME \t\r\n"),
            Some(b"MYGAME".to_vec())
        );
        assert_eq!(extract_load_name(b"Found: \x00"), None);
        assert_eq!(extract_load_name(b"Loading..."), None);
    }

    #[test]
    fn test_recover_load_name_end_to_end() {
        let loader = b"\x21\x10\xC0\xCD\xA2\x00Found:MYGAME\x00\x00\x00";
        let (head, tail) = loader.split_at(8);
        let text = format!(
            "\r\n{}\r\n{}\r\n:00000001FF\r\n",
            data_record(0xC008, tail),
            data_record(0xC000, head)
        );
        let mut region = vec![0xEA; 10];
        region.extend_from_slice(b"LOADER");
        region.extend_from_slice(text.as_bytes());
        region.extend_from_slice(&[FILL_BYTE; 6]);

        assert_eq!(recover_load_name(&region), Some(b"MYGAME".to_vec()));
    }
}
