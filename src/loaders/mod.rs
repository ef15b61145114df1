//! Loader families and multi-segment image decoding.
//!
//! Each family knows how to find its segment marker, read the address
//! header behind it, and which [`Cipher`](crate::cipher::Cipher) undoes its
//! obfuscation. [`decode_image`] walks an image segment by segment; each pass
//! starts on the remainder the previous one left behind.

pub mod mload;
pub mod nontama;

pub use mload::MLoader;
pub use nontama::Nontama;

use crate::error::{Result, TranscodeError};
use crate::formats::{self, magic};
use crate::types::{DecodedSegment, LoaderFamily};
use tracing::{debug, warn};

/// A vendor tape-loading convention.
pub trait SegmentLoader {
    /// Family implemented by this loader.
    fn family(&self) -> LoaderFamily;

    /// Offset of the next segment marker in `image`, if any.
    fn find_marker(&self, image: &[u8]) -> Option<usize>;

    /// Decode the segment whose marker sits at `marker`.
    ///
    /// Offsets in errors are relative to `image`.
    fn decode_at<'a>(&self, image: &'a [u8], marker: usize) -> Result<DecodedSegment<'a>>;
}

/// Loader implementation for a family.
pub fn loader_for(family: LoaderFamily) -> &'static dyn SegmentLoader {
    match family {
        LoaderFamily::Nontama => &Nontama,
        LoaderFamily::MLoader => &MLoader,
    }
}

/// Guess the loader family from the markers present in `image`.
pub fn detect_family(image: &[u8]) -> Option<LoaderFamily> {
    if formats::find(image, &magic::NONTAMA).is_some() {
        return Some(LoaderFamily::Nontama);
    }
    if image.starts_with(&magic::CAS_BLOCK)
        && formats::find(image, &magic::CAS_BLOAD_HEADER).is_some()
    {
        return Some(LoaderFamily::MLoader);
    }
    None
}

/// Decode every segment of `image` in order.
///
/// The first fatal error aborts the remaining segments and is reported with
/// the failing segment's index and marker offset. An image without any
/// marker is a [`TranscodeError::MalformedHeader`].
pub fn decode_image(image: &[u8], family: LoaderFamily) -> Result<Vec<DecodedSegment<'_>>> {
    let loader = loader_for(family);
    let mut segments: Vec<DecodedSegment<'_>> = Vec::new();
    let mut cursor = 0usize;

    while let Some(marker) = loader.find_marker(&image[cursor..]) {
        let index = segments.len();
        let offset = cursor + marker;
        let mut segment = loader
            .decode_at(&image[cursor..], marker)
            .map_err(|err| err.rebase(cursor).in_segment(index, offset))?;
        segment.offset = offset;

        let name = segment.load_name.as_deref().map(String::from_utf8_lossy);
        debug!(
            index,
            offset,
            family = %family,
            addresses = %segment.addresses,
            name = ?name,
            "decoded segment"
        );

        cursor = image.len() - segment.remainder.len();
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(TranscodeError::malformed(
            0,
            format!("no {} start marker found", family.name()),
        ));
    }
    if cursor < image.len() {
        debug!(trailing = image.len() - cursor, "bytes after last segment");
    }
    Ok(segments)
}

/// Decode an image, detecting the family from its markers.
pub fn decode_image_auto(image: &[u8]) -> Result<Vec<DecodedSegment<'_>>> {
    let family = detect_family(image).ok_or_else(|| {
        warn!(len = image.len(), "no known loader marker");
        TranscodeError::malformed(0, "no known loader marker found")
    })?;
    decode_image(image, family)
}
