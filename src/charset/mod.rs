//! MSX 8-bit character set codec.
//!
//! Decoding is deterministic: every byte sequence maps to exactly one
//! canonical string, and the result is re-encoded to prove it. Encoding is
//! forgiving: several Unicode spellings of the same glyph (halfwidth,
//! fullwidth, combining or precomposed sound marks) map to the same bytes.

pub mod table;

pub use table::{table, CharsetCodepoint, CharsetTable, AUX_FIRST, AUX_LAST, SHIFT_BYTE};

use crate::error::{Result, TranscodeError};
use crate::types::CodecOptions;
use unicode_normalization::UnicodeNormalization;

const HALFWIDTH_VOICED_MARK: char = '\u{FF9E}';
const HALFWIDTH_SEMI_VOICED_MARK: char = '\u{FF9F}';
const WAVE_DASH: char = '\u{301C}';
const HYPHEN: char = '\u{2010}';

/// Characters that never appear in derived file names.
const FILESYSTEM_FORBIDDEN: &str = "\"*+,/:;<=>?[\\]|\u{7F}¥¦";

/// Per-character encode attempt, tried in order until one maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// The character as given
    Identity,
    /// Compatibility decomposition of the character
    Nfkd,
    /// Canonical composition of the character
    Nfc,
}

impl Normalization {
    fn apply(self, ch: char) -> String {
        match self {
            Normalization::Identity => ch.to_string(),
            Normalization::Nfkd => std::iter::once(ch).nfkd().collect(),
            Normalization::Nfc => std::iter::once(ch).nfc().collect(),
        }
    }
}

const EXACT: &[Normalization] = &[Normalization::Identity];
const FORGIVING: &[Normalization] = &[
    Normalization::Identity,
    Normalization::Nfkd,
    Normalization::Nfc,
];

/// Strategies used for a given option set.
pub fn strategies(options: &CodecOptions) -> &'static [Normalization] {
    if options.try_harder {
        FORGIVING
    } else {
        EXACT
    }
}

/// Whether `ch` is a hiragana or katakana letter (fullwidth forms).
fn is_kana_letter(ch: char) -> bool {
    matches!(ch, '\u{3041}'..='\u{3096}' | '\u{30A1}'..='\u{30FA}')
}

fn is_hiragana_letter(ch: char) -> bool {
    matches!(ch, '\u{3041}'..='\u{3096}')
}

fn char_name(ch: char) -> String {
    unicode_names2::name(ch).map_or_else(|| format!("{ch:?}"), |name| name.to_string())
}

fn encode_one(table: &CharsetTable, s: &str) -> Option<CharsetCodepoint> {
    table.lookup(s).or_else(|| {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii() => Some(CharsetCodepoint::Direct(ch as u8)),
            _ => None,
        }
    })
}

/// Encode text into MSX charset bytes.
///
/// Kana letters are decomposed first so their sound marks encode as the
/// separate mark bytes the machine uses; wave dash and hyphen become their
/// ASCII lookalikes.
pub fn encode(text: &str, options: &CodecOptions) -> Result<Vec<u8>> {
    let table = table();
    let chars: Vec<char> = text
        .chars()
        .flat_map(|ch| -> Box<dyn Iterator<Item = char>> {
            match ch {
                ch if is_kana_letter(ch) => Box::new(std::iter::once(ch).nfkd()),
                WAVE_DASH => Box::new(std::iter::once('~')),
                HYPHEN => Box::new(std::iter::once('-')),
                ch => Box::new(std::iter::once(ch)),
            }
        })
        .collect();

    let mut out = Vec::with_capacity(chars.len());
    for (position, &ch) in chars.iter().enumerate() {
        let code = strategies(options)
            .iter()
            .find_map(|strategy| encode_one(table, &strategy.apply(ch)))
            .ok_or_else(|| TranscodeError::UnmappableCharacter {
                position,
                codepoint: u32::from(ch),
                name: char_name(ch),
            })?;
        code.write_to(&mut out);
    }
    Ok(out)
}

/// Decode MSX charset bytes into text.
///
/// The decoded text is re-encoded before returning; any difference from
/// `bytes` is a [`TranscodeError::RoundTripFailure`].
pub fn decode(bytes: &[u8], options: &CodecOptions) -> Result<String> {
    let table = table();
    let mut text = String::with_capacity(bytes.len());
    let mut prev: Option<u8> = None;

    for &byte in bytes {
        match (prev, table.decode_escape(byte)) {
            (Some(SHIFT_BYTE), Some(aux)) => {
                text.pop();
                text.push(aux);
            }
            _ if options.preserve.preserves(byte) => text.push(char::from(byte)),
            _ => text.push(table.decode_byte(byte)),
        }
        compose_sound_mark(&mut text);
        prev = Some(byte);
    }

    verify_round_trip(bytes, text, options)
}

/// Merge a trailing hiragana letter + halfwidth sound mark into one
/// precomposed character.
fn compose_sound_mark(text: &mut String) {
    let mut tail = text.chars().rev();
    let (Some(mark), Some(base)) = (tail.next(), tail.next()) else {
        return;
    };
    if !matches!(mark, HALFWIDTH_VOICED_MARK | HALFWIDTH_SEMI_VOICED_MARK)
        || !is_hiragana_letter(base)
    {
        return;
    }
    text.pop();
    text.pop();
    text.extend([base, mark].into_iter().nfkc());
}

fn verify_round_trip(bytes: &[u8], text: String, options: &CodecOptions) -> Result<String> {
    let exact = CodecOptions {
        try_harder: false,
        ..*options
    };
    let reencoded = match encode(&text, &exact) {
        Ok(reencoded) => reencoded,
        Err(err) => {
            return Err(TranscodeError::RoundTripFailure {
                text,
                detail: err.to_string(),
                mismatches: Vec::new(),
            })
        }
    };
    if reencoded == bytes {
        return Ok(text);
    }

    let mismatches: Vec<usize> = (0..bytes.len().max(reencoded.len()))
        .filter(|&i| bytes.get(i) != reencoded.get(i))
        .collect();
    Err(TranscodeError::RoundTripFailure {
        detail: format!(
            "{options:?} re-encoded {} bytes as {} bytes",
            bytes.len(),
            reencoded.len()
        ),
        text,
        mismatches,
    })
}

/// Replace characters unsafe in file names with `_`.
pub fn filesystem_safe(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch < ' ' || FILESYSTEM_FORBIDDEN.contains(ch) {
                '_'
            } else {
                ch
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ControlPolicy;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_all_bytes() {
        let bytes: Vec<u8> = (0..=u8::MAX).collect();
        let options = CodecOptions::new();
        let text = decode(&bytes, &options).unwrap();
        assert_eq!(encode(&text, &options).unwrap(), bytes);
    }

    #[test]
    fn test_round_trip_all_policies() {
        let bytes: Vec<u8> = (0..=u8::MAX).collect();
        for policy in [ControlPolicy::None, ControlPolicy::Minimal, ControlPolicy::FullAscii] {
            let options = CodecOptions::new().preserving(policy);
            let text = decode(&bytes, &options).unwrap();
            assert_eq!(encode(&text, &options).unwrap(), bytes, "{policy:?}");
        }
    }

    #[test]
    fn test_escape_symmetry() {
        let options = CodecOptions::new();
        for index in AUX_FIRST..=AUX_LAST {
            let bytes = [SHIFT_BYTE, index];
            let text = decode(&bytes, &options).unwrap();
            assert_eq!(text.chars().count(), 1);
            assert_eq!(encode(&text, &options).unwrap(), bytes.to_vec());
        }
    }

    #[test]
    fn test_escape_with_preserved_shift() {
        let options = CodecOptions::new().preserving(ControlPolicy::FullAscii);
        assert_eq!(decode(&[0x01, 0x41], &options).unwrap(), "月");
        assert_eq!(decode(&[0x01, 0x01, 0x41], &options).unwrap(), "\u{1}月");
        assert_eq!(decode(&[0x01, 0x60], &options).unwrap(), "\u{1}`");
    }

    #[test]
    fn test_sound_marks_compose() {
        let options = CodecOptions::new();
        let text = decode(&[0x96, 0xDE, 0xEA, 0xDF, 0xB6, 0xDE], &options).unwrap();
        assert_eq!(text, "がぱｶﾞ");
    }

    #[test]
    fn test_uncomposable_mark_kept_combining() {
        let text = decode(&[0x87, 0xDE], &CodecOptions::new()).unwrap();
        assert_eq!(text, "ぁ\u{3099}");
    }

    #[test]
    fn test_controls() {
        let minimal = CodecOptions::new();
        assert_eq!(decode(b"A\r\n\x00", &minimal).unwrap(), "A\r\n\0");
        let none = minimal.preserving(ControlPolicy::None);
        assert_eq!(decode(b"A\r\n\x00", &none).unwrap(), "A␍␊␀");
    }

    #[test]
    fn test_encode_kana_variants() {
        let options = CodecOptions::strict();
        assert_eq!(encode("ガ", &options).unwrap(), vec![0xB6, 0xDE]);
        assert_eq!(encode("ｶﾞ", &options).unwrap(), vec![0xB6, 0xDE]);
        assert_eq!(encode("か\u{309B}", &options).unwrap(), vec![0x96, 0xDE]);
        assert_eq!(encode("ゲーム", &options).unwrap(), vec![0xB9, 0xDE, 0xB0, 0xD1]);
        assert_eq!(encode("\u{301C}\u{2010}", &options).unwrap(), b"~-".to_vec());
        assert_eq!(encode("\\", &options).unwrap(), vec![0x5C]);
    }

    #[test]
    fn test_strict_encode_rejects_compatibility_forms() {
        let text = "\u{32D0}\u{FF21}";
        let err = encode(text, &CodecOptions::strict()).unwrap_err();
        match err {
            TranscodeError::UnmappableCharacter {
                position,
                codepoint,
                name,
            } => {
                assert_eq!(position, 0);
                assert_eq!(codepoint, 0x32D0);
                assert_eq!(name, "CIRCLED KATAKANA A");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(encode(text, &CodecOptions::new()).unwrap(), vec![0xB1, b'A']);
    }

    #[test]
    fn test_unmappable_even_when_forgiving() {
        let err = encode("A漢", &CodecOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            TranscodeError::UnmappableCharacter {
                position: 1,
                codepoint: 0x6F22,
                ..
            }
        ));
    }

    #[test]
    fn test_strategies() {
        assert_eq!(strategies(&CodecOptions::strict()), &[Normalization::Identity]);
        assert_eq!(strategies(&CodecOptions::new()).len(), 3);
    }

    #[test]
    fn test_filesystem_safe() {
        assert_eq!(filesystem_safe("A/B:C*D"), "A_B_C_D");
        assert_eq!(filesystem_safe("¥100¦\u{7F}\t"), "_100___");
        assert_eq!(filesystem_safe("ｹﾞｰﾑ 1"), "ｹﾞｰﾑ 1");
    }
}
