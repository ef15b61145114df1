//! Error types for the tape transcoder.
//!
//! Every failure is terminal for the segment being processed. None of these
//! conditions are transient, so nothing in the crate retries.

use thiserror::Error;

/// Primary error type for the tape transcoder.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing start marker, or an inconsistent or out-of-order address triple.
    #[error("Malformed header at offset {offset}: {message}")]
    MalformedHeader { offset: usize, message: String },

    /// Fewer bytes available than the header promises.
    #[error("Truncated input at offset {offset}: expected {expected} bytes, got {actual}")]
    TruncatedInput {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// A periodic Hamming-weight check byte disagreed with the decoded data.
    #[error(
        "Wrong check byte after decoding {position} data bytes: \
         stream has 0x{expected:02X} but computed 0x{computed:02X}"
    )]
    ChecksumMismatch {
        position: usize,
        expected: u8,
        computed: u8,
    },

    /// Decoded text does not re-encode to the original bytes.
    #[error("Round-trip failure for {text:?}: {detail} (mismatched byte positions {mismatches:?})")]
    RoundTripFailure {
        text: String,
        detail: String,
        mismatches: Vec<usize>,
    },

    /// No mapping for a character once the fallback chain is exhausted or disabled.
    #[error("No mapping for U+{codepoint:04X} {name} at position {position}")]
    UnmappableCharacter {
        position: usize,
        codepoint: u32,
        name: String,
    },

    /// A loadable-binary container does not match its declared layout.
    #[error("Invalid container: {message}")]
    InvalidContainer { message: String },

    /// A fatal error in one segment of a multi-segment image.
    #[error("Segment {index} at offset 0x{offset:X}: {source}")]
    Segment {
        index: usize,
        offset: usize,
        #[source]
        source: Box<TranscodeError>,
    },
}

impl TranscodeError {
    /// Shorthand for a [`TranscodeError::MalformedHeader`].
    pub fn malformed(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedHeader {
            offset,
            message: message.into(),
        }
    }

    /// Attach segment position information to an error.
    pub fn in_segment(self, index: usize, offset: usize) -> Self {
        Self::Segment {
            index,
            offset,
            source: Box::new(self),
        }
    }

    /// Shift the offset of a positional error by `base` bytes.
    ///
    /// Ciphers and header readers report offsets relative to the slice they
    /// were handed; loaders rebase them onto the image.
    pub fn rebase(self, base: usize) -> Self {
        match self {
            Self::MalformedHeader { offset, message } => Self::MalformedHeader {
                offset: offset + base,
                message,
            },
            Self::TruncatedInput {
                offset,
                expected,
                actual,
            } => Self::TruncatedInput {
                offset: offset + base,
                expected,
                actual,
            },
            other => other,
        }
    }
}

/// Result type alias for transcoder operations.
pub type Result<T> = std::result::Result<T, TranscodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TranscodeError::TruncatedInput {
            offset: 16,
            expected: 256,
            actual: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("16"));
        assert!(msg.contains("256"));
    }

    #[test]
    fn test_checksum_display() {
        let err = TranscodeError::ChecksumMismatch {
            position: 256,
            expected: 0xBE,
            computed: 0x80,
        };
        let msg = err.to_string();
        assert!(msg.contains("0xBE"));
        assert!(msg.contains("0x80"));
    }

    #[test]
    fn test_rebase_and_segment() {
        let err = TranscodeError::malformed(2, "bad").rebase(0x100).in_segment(1, 0x100);
        match err {
            TranscodeError::Segment { index, offset, source } => {
                assert_eq!(index, 1);
                assert_eq!(offset, 0x100);
                assert!(matches!(
                    *source,
                    TranscodeError::MalformedHeader { offset: 0x102, .. }
                ));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
