//! MSX 8-bit character table and its derived lookup maps.
//!
//! Kana here should be the halfwidth forms, but Unicode has no halfwidth
//! hiragana, so fullwidth ones stand in. The first row shows control
//! pictures and arrows for bytes an MSX never draws.

use std::collections::HashMap;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Byte that introduces a two-byte auxiliary character.
pub const SHIFT_BYTE: u8 = 0x01;

/// First auxiliary index byte following [`SHIFT_BYTE`].
pub const AUX_FIRST: u8 = 0x40;

/// Last auxiliary index byte following [`SHIFT_BYTE`].
pub const AUX_LAST: u8 = 0x5F;

/// Canonical character for every byte, sixteen per row pair.
const PRIMARY: &str = concat!(
    "␀␁␂␃␄␅␆␇␈␉␊␋␌␍␎␏␐␑␒␓␔␕␖␗␘␙␚␛￫￩￪￬",
    " !\"#$%&'()*+,-./0123456789:;<=>?",
    "@ABCDEFGHIJKLMNOPQRSTUVWXYZ[¥]^_",
    "`abcdefghijklmnopqrstuvwxyz{¦}~␡",
    "♠♥♦♣￮•をぁぃぅぇぉゃゅょっ\u{f8f4}あいうえおかきくけこさしすせそ",
    "\u{f8f0}｡｢｣､･ｦｧｨｩｪｫｬｭｮｯｰｱｲｳｴｵｶｷｸｹｺｻｼｽｾｿ",
    "ﾀﾁﾂﾃﾄﾅﾆﾇﾈﾉﾊﾋﾌﾍﾎﾏﾐﾑﾒﾓﾔﾕﾖﾗﾘﾙﾚﾛﾜﾝﾞﾟ",
    "たちつてとなにぬねのはひふへほまみむめもやゆよらりるれろわん\u{f8f2}\u{f8f3}",
);

/// Characters reached through `SHIFT_BYTE, AUX_FIRST + index`.
const AUXILIARY: &str = concat!(
    "\u{f8f1}月火水木金土日年円時分秒百千万",
    "π┴┬┤├┼│─┌┐└┘╳大中小",
);

/// Encoded form of one table character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharsetCodepoint {
    /// A single byte
    Direct(u8),
    /// [`SHIFT_BYTE`] followed by `AUX_FIRST + index`
    Escape(u8),
}

impl CharsetCodepoint {
    /// Append the encoded bytes to `out`.
    pub fn write_to(self, out: &mut Vec<u8>) {
        match self {
            CharsetCodepoint::Direct(byte) => out.push(byte),
            CharsetCodepoint::Escape(index) => out.extend_from_slice(&[SHIFT_BYTE, AUX_FIRST + index]),
        }
    }
}

/// Immutable decode and encode tables.
#[derive(Debug)]
pub struct CharsetTable {
    primary: [char; 256],
    auxiliary: [char; 32],
    direct: HashMap<char, CharsetCodepoint>,
    compat: HashMap<String, CharsetCodepoint>,
}

static TABLE: LazyLock<CharsetTable> = LazyLock::new(CharsetTable::build);

/// The process-wide table, built on first use.
pub fn table() -> &'static CharsetTable {
    &TABLE
}

impl CharsetTable {
    fn build() -> Self {
        let mut primary = ['\0'; 256];
        for (slot, ch) in primary.iter_mut().zip(PRIMARY.chars()) {
            *slot = ch;
        }
        let mut auxiliary = ['\0'; 32];
        for (slot, ch) in auxiliary.iter_mut().zip(AUXILIARY.chars()) {
            *slot = ch;
        }

        let mut direct = HashMap::with_capacity(256 + 32);
        for (byte, &ch) in (0..=u8::MAX).zip(primary.iter()) {
            direct.insert(ch, CharsetCodepoint::Direct(byte));
        }
        for (index, &ch) in (0..32u8).zip(auxiliary.iter()) {
            direct.insert(ch, CharsetCodepoint::Escape(index));
        }

        let mut compat: HashMap<String, CharsetCodepoint> = direct
            .iter()
            .filter_map(|(&ch, &code)| {
                let decomposed: String = std::iter::once(ch).nfkd().collect();
                let mut buf = [0u8; 4];
                (decomposed != *ch.encode_utf8(&mut buf)).then_some((decomposed, code))
            })
            .collect();

        // Fullwidth sound marks share the halfwidth glyphs' bytes.
        for (fullwidth, halfwidth) in [
            ('\u{309B}', '\u{FF9E}'),
            ('\u{309C}', '\u{FF9F}'),
            ('\u{30FC}', '\u{FF70}'),
        ] {
            if let Some(&code) = direct.get(&halfwidth) {
                compat.insert(fullwidth.to_string(), code);
            }
        }

        Self {
            primary,
            auxiliary,
            direct,
            compat,
        }
    }

    /// Canonical character for a single byte.
    pub fn decode_byte(&self, byte: u8) -> char {
        self.primary[usize::from(byte)]
    }

    /// Auxiliary character for an escape index byte, if in range.
    pub fn decode_escape(&self, index_byte: u8) -> Option<char> {
        (AUX_FIRST..=AUX_LAST)
            .contains(&index_byte)
            .then(|| self.auxiliary[usize::from(index_byte - AUX_FIRST)])
    }

    /// Table or compatibility entry for a string of one or more chars.
    pub fn lookup(&self, s: &str) -> Option<CharsetCodepoint> {
        let mut chars = s.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if let Some(&code) = self.direct.get(&ch) {
                return Some(code);
            }
        }
        self.compat.get(s).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sizes() {
        assert_eq!(PRIMARY.chars().count(), 256);
        assert_eq!(AUXILIARY.chars().count(), 32);
        assert_eq!(table().direct.len(), 256 + 32);
    }

    #[test]
    fn test_landmarks() {
        let t = table();
        assert_eq!(t.decode_byte(0x00), '␀');
        assert_eq!(t.decode_byte(0x41), 'A');
        assert_eq!(t.decode_byte(0x5C), '¥');
        assert_eq!(t.decode_byte(0x7F), '␡');
        assert_eq!(t.decode_byte(0x86), 'を');
        assert_eq!(t.decode_byte(0xB1), 'ｱ');
        assert_eq!(t.decode_byte(0xDE), 'ﾞ');
        assert_eq!(t.decode_byte(0xFD), 'ん');
        assert_eq!(t.decode_escape(0x41), Some('月'));
        assert_eq!(t.decode_escape(0x5F), Some('小'));
        assert_eq!(t.decode_escape(0x60), None);
    }

    #[test]
    fn test_compat_entries() {
        let t = table();
        assert_eq!(t.lookup("ア"), Some(CharsetCodepoint::Direct(0xB1)));
        assert_eq!(t.lookup("\u{3099}"), Some(CharsetCodepoint::Direct(0xDE)));
        assert_eq!(t.lookup("\u{309B}"), Some(CharsetCodepoint::Direct(0xDE)));
        assert_eq!(t.lookup("ー"), Some(CharsetCodepoint::Direct(0xB0)));
        assert_eq!(t.lookup("。"), Some(CharsetCodepoint::Direct(0xA1)));
        assert_eq!(t.lookup("月"), Some(CharsetCodepoint::Escape(0x01)));
        assert_eq!(t.lookup("\\"), None);
    }

    #[test]
    fn test_escape_bytes() {
        let mut out = Vec::new();
        CharsetCodepoint::Escape(0x1F).write_to(&mut out);
        CharsetCodepoint::Direct(0x20).write_to(&mut out);
        assert_eq!(out, vec![0x01, 0x5F, 0x20]);
    }
}
