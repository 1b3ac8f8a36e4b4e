//! Byte-order-mark detection
//!
//! Auto-detection only looks at byte-order marks: a file that
//! starts with one is decoded with the matching Unicode encoding, anything
//! else falls back to the configured native codepage.

use std::io::{self, Read};

use encoding_rs::{Encoding as Codec, UTF_8, UTF_16BE, UTF_16LE};

use crate::EncodingName;

/// Longest byte-order mark recognized (UTF-8)
pub const MAX_BOM_LEN: usize = 3;

/// A recognized byte-order mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bom {
    /// `EF BB BF`
    Utf8,
    /// `FF FE`
    Utf16Le,
    /// `FE FF`
    Utf16Be,
}

impl Bom {
    /// The marker bytes as they appear at the start of a file
    pub fn bytes(self) -> &'static [u8] {
        match self {
            Bom::Utf8 => &[0xEF, 0xBB, 0xBF],
            Bom::Utf16Le => &[0xFF, 0xFE],
            Bom::Utf16Be => &[0xFE, 0xFF],
        }
    }

    /// Codec announced by this mark
    pub fn codec(self) -> &'static Codec {
        match self {
            Bom::Utf8 => UTF_8,
            Bom::Utf16Le => UTF_16LE,
            Bom::Utf16Be => UTF_16BE,
        }
    }

    /// Symbolic encoding name announced by this mark
    pub fn encoding_name(self) -> EncodingName {
        match self {
            Bom::Utf8 => EncodingName::Utf8,
            Bom::Utf16Le => EncodingName::Unicode,
            Bom::Utf16Be => EncodingName::UnicodeBe,
        }
    }
}

/// Detect a byte-order mark at the start of `data`
pub fn detect_bom(data: &[u8]) -> Option<Bom> {
    if data.starts_with(Bom::Utf8.bytes()) {
        Some(Bom::Utf8)
    } else if data.starts_with(Bom::Utf16Le.bytes()) {
        Some(Bom::Utf16Le)
    } else if data.starts_with(Bom::Utf16Be.bytes()) {
        Some(Bom::Utf16Be)
    } else {
        None
    }
}

/// Read up to [`MAX_BOM_LEN`] bytes from the start of `reader`.
///
/// Short reads are retried so a slow reader cannot hide a mark; fewer bytes
/// are returned only at end of input. The caller is expected to replay the
/// returned bytes ahead of the rest of the stream.
pub fn read_prefix<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut prefix = [0u8; MAX_BOM_LEN];
    let mut filled = 0;

    while filled < MAX_BOM_LEN {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(prefix[..filled].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out one byte per call
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.split_first() {
                Some((&first, rest)) if !buf.is_empty() => {
                    buf[0] = first;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn test_detects_each_mark() {
        assert_eq!(detect_bom(&[0xEF, 0xBB, 0xBF, b'H']), Some(Bom::Utf8));
        assert_eq!(detect_bom(&[0xFF, 0xFE, b'H', 0x00]), Some(Bom::Utf16Le));
        assert_eq!(detect_bom(&[0xFE, 0xFF, 0x00, b'H']), Some(Bom::Utf16Be));
    }

    #[test]
    fn test_no_mark() {
        assert_eq!(detect_bom(b"Hello"), None);
        assert_eq!(detect_bom(&[]), None);
        // Truncated UTF-8 mark
        assert_eq!(detect_bom(&[0xEF, 0xBB]), None);
    }

    #[test]
    fn test_mark_properties() {
        assert_eq!(Bom::Utf16Be.codec(), UTF_16BE);
        assert_eq!(Bom::Utf8.encoding_name(), EncodingName::Utf8);
        assert_eq!(Bom::Utf16Le.bytes().len(), 2);
    }

    #[test]
    fn test_read_prefix_survives_short_reads() {
        let mut reader = Trickle(&[0xEF, 0xBB, 0xBF, b'x', b'y']);
        let prefix = read_prefix(&mut reader).unwrap();
        assert_eq!(prefix, [0xEF, 0xBB, 0xBF]);
        assert_eq!(reader.0, b"xy");
    }

    #[test]
    fn test_read_prefix_short_input() {
        let mut reader: &[u8] = b"a";
        assert_eq!(read_prefix(&mut reader).unwrap(), b"a");
    }
}
