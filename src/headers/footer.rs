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

use bincode::{Encode, Decode};
use bincode::encode_to_vec;
use bincode::decode_from_slice;
use indexmap::IndexMap;

use crate::headers::fixed_config;
use crate::io::InputReader;
use crate::io::OutputWriter;

type E = Box<dyn std::error::Error>;

/// Encoded length of [Regions].
pub const REGIONS_LEN: usize = 72;

/// Length of the trailer that locates the footer: start and end of the footer.
pub const TRAILER_LEN: u64 = 16;

#[derive(Debug, Clone)]
pub struct CorruptArchive {
    pub message: String,
}

impl std::fmt::Display for CorruptArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "corrupt .rma6 archive: {}", self.message)
    }
}

impl std::error::Error for CorruptArchive {}

/// Byte offsets delimiting the sections of an archive.
///
/// Every `end_*` is exclusive. `start_footer` is also the first value of
/// the 16 byte trailer.
#[derive(Encode, Decode, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Regions {
    pub start_header: u64,
    pub end_header: u64,
    pub start_reads: u64,
    pub end_reads: u64,
    pub start_classifications: u64,
    pub end_classifications: u64,
    pub start_aux: u64,
    pub end_aux: u64,
    pub start_footer: u64,
}

/// Archive footer, the last section of every finished archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footer {
    pub number_of_reads: u64,
    pub number_of_matches: u64,
    /// Start of each classification block, in the order the blocks were written.
    pub classification_offsets: IndexMap<String, u64>,
    pub regions: Regions,
    /// Equals the length of a finished archive.
    pub end_footer: u64,
}

impl Footer {
    /// Writes the footer at the current position of `writer`.
    ///
    /// Sets `regions.start_footer` and `end_footer` from the writer position.
    pub fn write<W: Write + Seek>(
        &mut self,
        writer: &mut OutputWriter<W>,
    ) -> Result<(), E> {
        self.regions.start_footer = writer.position();

        writer.write_i64(self.number_of_reads as i64)?;
        writer.write_i64(self.number_of_matches as i64)?;
        writer.write_i32(self.classification_offsets.len() as i32)?;
        for (name, offset) in self.classification_offsets.iter() {
            writer.write_string_plain(name.as_bytes())?;
            writer.write_i64(*offset as i64)?;
        }

        let bytes = encode_to_vec(self.regions, fixed_config())?;
        assert_eq!(bytes.len(), REGIONS_LEN);
        writer.write_bytes(&bytes)?;

        self.end_footer = writer.position() + 8;
        writer.write_i64(self.end_footer as i64)?;

        Ok(())
    }

    /// Locates and reads the footer of a finished archive.
    ///
    /// Fails with [CorruptArchive] if the recorded end of the footer is not
    /// the end of the file, which is what an interrupted write leaves behind.
    pub fn read<R: Read + Seek>(
        reader: &mut InputReader<R>,
    ) -> Result<Self, E> {
        let start_footer = locate_footer(reader)?;
        reader.seek(start_footer)?;

        let number_of_reads = reader.read_i64()?.max(0) as u64;
        let number_of_matches = reader.read_i64()?.max(0) as u64;
        let n_classifications = reader.read_i32()?;
        if n_classifications < 0 {
            return Err(Box::new(CorruptArchive{ message: format!("negative classification count {}", n_classifications) }))
        }
        let mut classification_offsets: IndexMap<String, u64> = IndexMap::with_capacity((n_classifications as usize).min(1024));
        for _ in 0..n_classifications {
            let name = reader.read_utf8()?;
            let offset = reader.read_offset()?;
            classification_offsets.insert(name, offset);
        }

        let bytes = reader.read_bytes(REGIONS_LEN)?;
        let regions: Regions = decode_from_slice(&bytes, fixed_config())?.0;
        let end_footer = reader.read_i64()?;

        if regions.start_footer != start_footer {
            return Err(Box::new(CorruptArchive{ message: format!("footer starts at {} but records start {}", start_footer, regions.start_footer) }))
        }
        if end_footer < 0 || end_footer as u64 != reader.length() {
            return Err(Box::new(CorruptArchive{ message: format!("footer ends at {} but file length is {}", end_footer, reader.length()) }))
        }

        Ok(Footer{ number_of_reads, number_of_matches, classification_offsets, regions, end_footer: end_footer as u64 })
    }
}

impl std::fmt::Display for Footer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "reads\t{}", self.number_of_reads)?;
        writeln!(f, "matches\t{}", self.number_of_matches)?;
        writeln!(f, "header\t{}-{}", self.regions.start_header, self.regions.end_header)?;
        writeln!(f, "reads_section\t{}-{}", self.regions.start_reads, self.regions.end_reads)?;
        writeln!(f, "classifications_section\t{}-{}", self.regions.start_classifications, self.regions.end_classifications)?;
        writeln!(f, "aux_section\t{}-{}", self.regions.start_aux, self.regions.end_aux)?;
        write!(f, "footer\t{}-{}", self.regions.start_footer, self.end_footer)
    }
}

/// Returns the start of the footer by reading the trailer.
///
/// Only seeks to `length - 16`, the archive is never scanned.
pub fn locate_footer<R: Read + Seek>(
    reader: &mut InputReader<R>,
) -> Result<u64, E> {
    if reader.length() < TRAILER_LEN {
        return Err(Box::new(CorruptArchive{ message: format!("file of {} bytes has no footer", reader.length()) }))
    }
    reader.seek(reader.length() - TRAILER_LEN)?;
    let start_footer = reader.read_i64()?;
    if start_footer < 0 || start_footer as u64 > reader.length() - TRAILER_LEN {
        return Err(Box::new(CorruptArchive{ message: format!("footer offset {} is outside the file", start_footer) }))
    }
    Ok(start_footer as u64)
}
