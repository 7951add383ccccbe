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

//! Typed reading and writing of the primitives an .rma6 archive is made of.
//!
//! All integers are stored big-endian with fixed width. Strings and byte
//! blobs are stored with a signed 32-bit length prefix:
//!
//!   - `n >= 0`: `n` raw bytes follow.
//!   - `n < 0`: `-n` bytes of a zlib stream follow.
//!
//! The sign is the only place where compression is recorded, so a reader
//! never needs to know how the writer was configured.
//!

use std::fs::File;
use std::io::BufWriter;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::compression::Compression;
use crate::compression::inflate_bytes;
use crate::compression::maybe_deflate;

type E = Box<dyn std::error::Error>;

/// Handles that can be truncated or extended in place.
pub trait SetLen {
    fn set_len(&mut self, len: u64) -> std::io::Result<()>;
}

impl SetLen for File {
    fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        File::set_len(self, len)
    }
}

impl SetLen for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        self.get_mut().resize(len as usize, 0);
        if self.position() > len {
            self.set_position(len);
        }
        Ok(())
    }
}

impl<T: SetLen + Write> SetLen for BufWriter<T> {
    fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        self.flush()?;
        self.get_mut().set_len(len)
    }
}

impl<T: SetLen + ?Sized> SetLen for &mut T {
    fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        (**self).set_len(len)
    }
}

fn eof(what: &str, at: u64, len: u64) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("{} past end of archive (offset {}, length {})", what, at, len),
    )
}

/// Reads primitives from a seekable handle.
pub struct InputReader<R: Read + Seek> {
    inner: R,
    length: u64,
}

impl<R: Read + Seek> InputReader<R> {
    pub fn new(
        mut inner: R,
    ) -> Result<Self, E> {
        let length = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(InputReader{ inner, length })
    }

    /// Length of the underlying handle when this reader was created.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn position(&mut self) -> Result<u64, E> {
        Ok(self.inner.stream_position()?)
    }

    pub fn seek(
        &mut self,
        offset: u64,
    ) -> Result<(), E> {
        if offset > self.length {
            return Err(Box::new(eof("seek", offset, self.length)))
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn skip_bytes(
        &mut self,
        n: u64,
    ) -> Result<(), E> {
        let here = self.position()?;
        if here + n > self.length {
            return Err(Box::new(eof("skip", here + n, self.length)))
        }
        self.inner.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, E> {
        Ok(self.inner.read_u8()?)
    }

    pub fn read_i32(&mut self) -> Result<i32, E> {
        Ok(self.inner.read_i32::<BigEndian>()?)
    }

    pub fn read_i64(&mut self) -> Result<i64, E> {
        Ok(self.inner.read_i64::<BigEndian>()?)
    }

    /// Reads an i64 that must be a valid offset into this archive.
    pub fn read_offset(&mut self) -> Result<u64, E> {
        let value = self.read_i64()?;
        if value < 0 || value as u64 > self.length {
            return Err(Box::new(eof("offset", value.max(0) as u64, self.length)))
        }
        Ok(value as u64)
    }

    pub fn read_bytes(
        &mut self,
        n: usize,
    ) -> Result<Vec<u8>, E> {
        let mut bytes: Vec<u8> = vec![0; n];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads a length-prefixed string, inflating it if it was stored compressed.
    pub fn read_string(&mut self) -> Result<Vec<u8>, E> {
        let n = self.read_i32()?;
        let stored = n.unsigned_abs() as u64;
        let here = self.position()?;
        if here + stored > self.length {
            return Err(Box::new(eof("string", here + stored, self.length)))
        }
        let bytes = self.read_bytes(stored as usize)?;
        if n < 0 {
            inflate_bytes(&bytes)
        } else {
            Ok(bytes)
        }
    }

    pub fn read_utf8(&mut self) -> Result<String, E> {
        Ok(String::from_utf8(self.read_string()?)?)
    }

    /// Skips a length-prefixed string without inflating it.
    ///
    /// Consumes exactly the bytes [read_string](InputReader::read_string)
    /// would have consumed.
    pub fn skip_string(&mut self) -> Result<(), E> {
        let n = self.read_i32()?;
        self.skip_bytes(n.unsigned_abs() as u64)
    }

    /// Borrows the handle as a new reader with the same length.
    pub fn by_ref(&mut self) -> InputReader<&mut R> {
        InputReader{ inner: &mut self.inner, length: self.length }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes primitives to a seekable handle.
///
/// The current position is tracked here so that buffered handles do not
/// need to be flushed to answer [position](OutputWriter::position).
pub struct OutputWriter<W: Write + Seek> {
    inner: W,
    position: u64,
    compression: Compression,
}

impl<W: Write + Seek> OutputWriter<W> {
    pub fn new(
        mut inner: W,
        compression: Compression,
    ) -> Result<Self, E> {
        let position = inner.stream_position()?;
        Ok(OutputWriter{ inner, position, compression })
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn seek(
        &mut self,
        offset: u64,
    ) -> Result<(), E> {
        self.position = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn seek_end(&mut self) -> Result<u64, E> {
        self.position = self.inner.seek(SeekFrom::End(0))?;
        Ok(self.position)
    }

    pub fn write_u8(
        &mut self,
        value: u8,
    ) -> Result<(), E> {
        self.inner.write_u8(value)?;
        self.position += 1;
        Ok(())
    }

    pub fn write_i32(
        &mut self,
        value: i32,
    ) -> Result<(), E> {
        self.inner.write_i32::<BigEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_i64(
        &mut self,
        value: i64,
    ) -> Result<(), E> {
        self.inner.write_i64::<BigEndian>(value)?;
        self.position += 8;
        Ok(())
    }

    pub fn write_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(), E> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Overwrites the i64 at `offset` and returns to the current position.
    pub fn patch_i64(
        &mut self,
        offset: u64,
        value: i64,
    ) -> Result<(), E> {
        let here = self.position;
        self.seek(offset)?;
        self.write_i64(value)?;
        self.seek(here)?;
        Ok(())
    }

    /// Writes a length-prefixed string, compressed if the writer allows it.
    pub fn write_string(
        &mut self,
        bytes: &[u8],
    ) -> Result<(), E> {
        match maybe_deflate(self.compression, bytes)? {
            Some(deflated) => {
                self.write_i32(-checked_len(deflated.len())?)?;
                self.write_bytes(&deflated)
            },
            None => self.write_string_plain(bytes),
        }
    }

    /// Writes a length-prefixed string that is never compressed.
    pub fn write_string_plain(
        &mut self,
        bytes: &[u8],
    ) -> Result<(), E> {
        self.write_i32(checked_len(bytes.len())?)?;
        self.write_bytes(bytes)
    }

    pub fn flush(&mut self) -> Result<(), E> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek + SetLen> OutputWriter<W> {
    /// Discards everything from `len` onwards and positions the writer there.
    pub fn truncate(
        &mut self,
        len: u64,
    ) -> Result<(), E> {
        self.inner.flush()?;
        self.inner.set_len(len)?;
        self.seek(len)
    }
}

fn checked_len(len: usize) -> Result<i32, E> {
    i32::try_from(len).map_err(|_| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("payload of {} bytes exceeds the 2 GiB string limit", len),
        )) as E
    })
}

#[cfg(test)]
mod tests {

    #[test]
    fn primitives_are_big_endian() {
        use super::OutputWriter;
        use crate::compression::Compression;
        use std::io::Cursor;

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::None).unwrap();
        writer.write_i32(1).unwrap();
        writer.write_i64(-2).unwrap();
        writer.write_u8(7).unwrap();
        assert_eq!(writer.position(), 13);

        let expected: Vec<u8> = vec![0, 0, 0, 1, 255, 255, 255, 255, 255, 255, 255, 254, 7];
        assert_eq!(writer.into_inner().into_inner(), expected);
    }

    #[test]
    fn compressed_string_has_negative_length() {
        use super::InputReader;
        use super::OutputWriter;
        use crate::compression::Compression;
        use std::io::Cursor;

        let text = b"ERR4035126.1\t16\tOZ038621.1\t4541508\t60\t151M\t*\t0\t0\t*\t*\n".repeat(4);

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        writer.write_string(&text).unwrap();
        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes[0] & 0x80, 0x80);

        let mut reader = InputReader::new(Cursor::new(bytes.clone())).unwrap();
        assert_eq!(reader.read_string().unwrap(), text);
        assert_eq!(reader.position().unwrap(), bytes.len() as u64);
    }

    #[test]
    fn skip_string_consumes_same_bytes_as_read_string() {
        use super::InputReader;
        use super::OutputWriter;
        use crate::compression::Compression;
        use std::io::Cursor;

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        writer.write_string(&b"ACGT".repeat(100)).unwrap();
        writer.write_string(b"short").unwrap();
        writer.write_i32(42).unwrap();
        let bytes = writer.into_inner().into_inner();

        let mut read = InputReader::new(Cursor::new(bytes.clone())).unwrap();
        read.read_string().unwrap();
        read.read_string().unwrap();

        let mut skip = InputReader::new(Cursor::new(bytes)).unwrap();
        skip.skip_string().unwrap();
        skip.skip_string().unwrap();

        assert_eq!(read.position().unwrap(), skip.position().unwrap());
        assert_eq!(skip.read_i32().unwrap(), 42);
    }

    #[test]
    fn truncated_reads_fail() {
        use super::InputReader;
        use std::io::Cursor;

        let mut reader = InputReader::new(Cursor::new(vec![0_u8, 0, 0])).unwrap();
        assert!(reader.read_i32().is_err());

        // Length prefix claims more bytes than exist
        let mut reader = InputReader::new(Cursor::new(vec![0_u8, 0, 0, 10, 1, 2])).unwrap();
        assert!(reader.read_string().is_err());

        let mut reader = InputReader::new(Cursor::new(vec![0_u8; 4])).unwrap();
        assert!(reader.seek(5).is_err());
        assert!(reader.skip_bytes(5).is_err());
    }

    #[test]
    fn patch_i64_returns_to_position() {
        use super::InputReader;
        use super::OutputWriter;
        use crate::compression::Compression;
        use std::io::Cursor;

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::None).unwrap();
        writer.write_i64(0).unwrap();
        writer.write_i32(5).unwrap();
        writer.patch_i64(0, 1234).unwrap();
        assert_eq!(writer.position(), 12);
        writer.write_i32(6).unwrap();

        let mut reader = InputReader::new(writer.into_inner()).unwrap();
        assert_eq!(reader.read_i64().unwrap(), 1234);
        assert_eq!(reader.read_i32().unwrap(), 5);
        assert_eq!(reader.read_i32().unwrap(), 6);
    }

    #[test]
    fn truncate_discards_tail() {
        use super::OutputWriter;
        use crate::compression::Compression;
        use std::io::Cursor;

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::None).unwrap();
        writer.write_i64(1).unwrap();
        writer.write_i64(2).unwrap();
        writer.truncate(8).unwrap();
        writer.write_i32(3).unwrap();

        assert_eq!(writer.into_inner().into_inner(), vec![0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 3]);
    }
}
