// rma6: Seekable, self-indexing archive format for reads and alignments.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Compression of strings and byte blobs stored in an .rma6 archive.
//!
//! Compressed payloads are plain zlib streams. Whether a payload is
//! compressed is recorded in the sign of its length prefix, see
//! [OutputWriter::write_string](crate::io::OutputWriter::write_string).
//!

use std::io::Read;
use std::io::Write;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

type E = Box<dyn std::error::Error>;

/// Payloads shorter than this are always stored raw.
pub const MIN_COMPRESS_LEN: usize = 64;

/// Supported compression methods for compressible strings and blobs.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// zlib stream with flate2
    #[default]
    Deflate,
    /// Always store raw bytes
    None,
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deflate" => Ok(Compression::Deflate),
            "none" => Ok(Compression::None),
            _ => Err(format!("'{}' is not a valid Compression", s)),
        }
    }
}

pub fn deflate_bytes(
    bytes: &[u8],
) -> Result<Vec<u8>, E> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), flate2::Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

pub fn inflate_bytes(
    bytes: &[u8],
) -> Result<Vec<u8>, E> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len() * 4);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Compress `bytes` if it pays off.
///
/// Returns None when `bytes` should be stored raw: compression is
/// disabled, the payload is shorter than [MIN_COMPRESS_LEN], or the
/// deflated stream would not be shorter than the input.
pub fn maybe_deflate(
    compression: Compression,
    bytes: &[u8],
) -> Result<Option<Vec<u8>>, E> {
    match compression {
        Compression::None => Ok(None),
        Compression::Deflate => {
            if bytes.len() < MIN_COMPRESS_LEN {
                return Ok(None)
            }
            let deflated = deflate_bytes(bytes)?;
            if deflated.len() < bytes.len() {
                Ok(Some(deflated))
            } else {
                Ok(None)
            }
        },
    }
}

#[cfg(test)]
mod tests {

    #[test]
    fn deflate_then_inflate_text() {
        use super::deflate_bytes;
        use super::inflate_bytes;

        let text = b"read_1\t0\tref_7\t11\t255\t30M\t*\t0\t0\t*\t*\tAS:i:55\n".repeat(8);
        let deflated = deflate_bytes(&text).unwrap();
        assert!(deflated.len() < text.len());
        assert_eq!(inflate_bytes(&deflated).unwrap(), text);
    }

    #[test]
    fn maybe_deflate_short_payload_is_raw() {
        use super::maybe_deflate;
        use super::Compression;

        assert_eq!(maybe_deflate(Compression::Deflate, b">r1\nACGT").unwrap(), None);
    }

    #[test]
    fn maybe_deflate_respects_toggle() {
        use super::maybe_deflate;
        use super::Compression;

        let text = b"ACGT".repeat(64);
        assert_eq!(maybe_deflate(Compression::None, &text).unwrap(), None);
        assert!(maybe_deflate(Compression::Deflate, &text).unwrap().is_some());
    }

    #[test]
    fn inflate_garbage_fails() {
        use super::inflate_bytes;

        assert!(inflate_bytes(&[1, 2, 3, 4, 5]).is_err());
    }
}
