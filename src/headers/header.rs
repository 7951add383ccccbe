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
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use bincode::{Encode, Decode};
use bincode::encode_to_vec;
use bincode::decode_from_slice;

use crate::BlastMode;
use crate::headers::fixed_config;
use crate::io::InputReader;
use crate::io::OutputWriter;

type E = Box<dyn std::error::Error>;

/// "RMA6" in ASCII.
pub const MAGIC_NUMBER: i32 = 0x524D4136;
pub const VERSION: i32 = 6;
pub const MINOR_VERSION: i32 = 0;

/// Encoded length of [Preamble].
pub const PREAMBLE_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct InvalidHeader {
    pub message: String,
}

impl std::fmt::Display for InvalidHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "not an .rma6 archive: {}", self.message)
    }
}

impl std::error::Error for InvalidHeader {}

/// Fixed-size start of every archive.
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    pub magic: i32,
    pub version: i32,
    pub minor_version: i32,
}

/// Archive header, written once when the archive is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Program that created the archive.
    pub creator: String,
    /// Milliseconds since the epoch. Set to the current time on write if None.
    pub creation_date: Option<i64>,
    pub blast_mode: BlastMode,
    pub paired_reads: bool,
    /// Classifications whose class ids are stored with every match, in
    /// id-table column order.
    pub classification_names: Vec<String>,
    /// Minor version read from the archive, [MINOR_VERSION] for new headers.
    pub minor_version: i32,
}

impl Header {
    pub fn new(
        creator: &str,
        blast_mode: BlastMode,
        paired_reads: bool,
        classification_names: &[String],
    ) -> Self {
        Header{
            creator: creator.to_string(),
            creation_date: None,
            blast_mode,
            paired_reads,
            classification_names: classification_names.to_vec(),
            minor_version: MINOR_VERSION,
        }
    }

    pub fn n_classifications(&self) -> usize {
        self.classification_names.len()
    }

    pub fn write<W: Write + Seek>(
        &mut self,
        writer: &mut OutputWriter<W>,
    ) -> Result<(), E> {
        let preamble = Preamble{ magic: MAGIC_NUMBER, version: VERSION, minor_version: MINOR_VERSION };
        let bytes = encode_to_vec(preamble, fixed_config())?;
        assert_eq!(bytes.len(), PREAMBLE_LEN);
        writer.write_bytes(&bytes)?;

        writer.write_string_plain(self.creator.as_bytes())?;
        if self.creation_date.is_none() {
            self.creation_date = Some(now_millis());
        }
        writer.write_i64(self.creation_date.unwrap_or_default())?;
        writer.write_string_plain(self.blast_mode.to_string().as_bytes())?;
        writer.write_u8(if self.paired_reads { 1 } else { 0 })?;

        writer.write_i32(self.classification_names.len() as i32)?;
        for name in self.classification_names.iter() {
            writer.write_string_plain(name.as_bytes())?;
        }
        self.minor_version = MINOR_VERSION;

        Ok(())
    }

    /// Reads the header at the current position of `reader`.
    ///
    /// This is the validity gate on opening an archive: fails with
    /// [InvalidHeader] if the magic number or the version do not match.
    pub fn read<R: Read + Seek>(
        reader: &mut InputReader<R>,
    ) -> Result<Self, E> {
        let bytes = reader.read_bytes(PREAMBLE_LEN).map_err(|_| {
            Box::new(InvalidHeader{ message: "file is too short".to_string() }) as E
        })?;
        let preamble: Preamble = decode_from_slice(&bytes, fixed_config())?.0;
        if preamble.magic != MAGIC_NUMBER {
            return Err(Box::new(InvalidHeader{ message: format!("bad magic number {:#010x}", preamble.magic) }))
        }
        if preamble.version != VERSION {
            return Err(Box::new(InvalidHeader{ message: format!("unsupported version {}.{}", preamble.version, preamble.minor_version) }))
        }

        let creator = reader.read_utf8()?;
        let creation_date = reader.read_i64()?;
        let mode = reader.read_utf8()?;
        let blast_mode = mode.parse::<BlastMode>().unwrap_or_else(|_| {
            log::warn!("Unrecognized blast mode '{}'", mode);
            BlastMode::Unknown
        });
        let paired_reads = reader.read_u8()? != 0;

        let n_classifications = reader.read_i32()?;
        if n_classifications < 0 {
            return Err(Box::new(InvalidHeader{ message: format!("negative classification count {}", n_classifications) }))
        }
        let mut classification_names: Vec<String> = Vec::with_capacity((n_classifications as usize).min(1024));
        for _ in 0..n_classifications {
            classification_names.push(reader.read_utf8()?);
        }

        Ok(Header{
            creator, creation_date: Some(creation_date), blast_mode, paired_reads,
            classification_names, minor_version: preamble.minor_version,
        })
    }
}

impl std::fmt::Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "version\t{}.{}", VERSION, self.minor_version)?;
        writeln!(f, "creator\t{}", self.creator)?;
        writeln!(f, "creation_date\t{}", self.creation_date.unwrap_or_default())?;
        writeln!(f, "blast_mode\t{}", self.blast_mode)?;
        writeln!(f, "paired_reads\t{}", self.paired_reads)?;
        write!(f, "classifications\t{}", self.classification_names.join(","))
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {

    #[test]
    fn write_header() {
        use super::Header;
        use crate::BlastMode;
        use crate::compression::Compression;
        use crate::io::OutputWriter;
        use std::io::Cursor;

        let mut header = Header::new("rma6", BlastMode::BlastX, true, &["Taxonomy".to_string()]);
        header.creation_date = Some(1);

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        header.write(&mut writer).unwrap();

        let expected: Vec<u8> = vec![
            82, 77, 65, 54, 0, 0, 0, 6, 0, 0, 0, 0,
            0, 0, 0, 4, 114, 109, 97, 54,
            0, 0, 0, 0, 0, 0, 0, 1,
            0, 0, 0, 6, 66, 108, 97, 115, 116, 88,
            1,
            0, 0, 0, 1, 0, 0, 0, 8, 84, 97, 120, 111, 110, 111, 109, 121,
        ];
        assert_eq!(writer.into_inner().into_inner(), expected);
    }

    #[test]
    fn read_written_header() {
        use super::Header;
        use crate::BlastMode;
        use crate::compression::Compression;
        use crate::io::InputReader;
        use crate::io::OutputWriter;

        use std::io::Cursor;

        let names = vec!["Taxonomy".to_string(), "SEED".to_string(), "EC".to_string()];
        let mut header = Header::new("MEGAN", BlastMode::BlastN, false, &names);

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        header.write(&mut writer).unwrap();
        assert!(header.creation_date.is_some());

        let mut reader = InputReader::new(writer.into_inner()).unwrap();
        let got = Header::read(&mut reader).unwrap();

        assert_eq!(got, header);
        assert_eq!(got.n_classifications(), 3);
    }

    #[test]
    fn read_rejects_bad_magic() {
        use super::Header;
        use super::InvalidHeader;
        use crate::io::InputReader;
        use std::io::Cursor;

        let bytes: Vec<u8> = vec![82, 77, 65, 53, 0, 0, 0, 6, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut reader = InputReader::new(Cursor::new(bytes)).unwrap();
        let got = Header::read(&mut reader);

        assert!(got.unwrap_err().downcast_ref::<InvalidHeader>().is_some());
    }

    #[test]
    fn read_rejects_other_version() {
        use super::Header;
        use super::InvalidHeader;
        use crate::io::InputReader;
        use std::io::Cursor;

        let bytes: Vec<u8> = vec![82, 77, 65, 54, 0, 0, 0, 5, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut reader = InputReader::new(Cursor::new(bytes)).unwrap();
        let got = Header::read(&mut reader);

        assert!(got.unwrap_err().downcast_ref::<InvalidHeader>().is_some());
    }

    #[test]
    fn read_rejects_short_file() {
        use super::Header;
        use super::InvalidHeader;
        use crate::io::InputReader;
        use std::io::Cursor;

        let mut reader = InputReader::new(Cursor::new(vec![82_u8, 77, 65])).unwrap();
        let got = Header::read(&mut reader);

        assert!(got.unwrap_err().downcast_ref::<InvalidHeader>().is_some());
    }
}
