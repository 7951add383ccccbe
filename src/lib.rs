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

//! rma6 is a library and a command-line client for reading and writing
//! .rma6 archives.
//!
//! An .rma6 archive stores sequencing reads together with their matches
//! (alignments) against a reference database, and one or more
//! classification indices that map class ids (taxa, functional groups, ...)
//! to the reads assigned to them. The archive is written once, sequentially,
//! and is self-describing: a footer at the end of the file records where
//! every section starts and ends, so readers can jump straight to a single
//! read or to the reads of a single class without scanning the file.
//!
//! Every read record is identified by its byte offset in the archive, its
//! uid. Classification indices and mate references are lists of uids.
//!
//! ## Usage
//!
//! ### Command line
//!
//! The rma6 CLI supports the following subcommands:
//!   - `rma6 create` build an archive from a SAM file and optional reads.
//!   - `rma6 info` print the header, footer and class counts of an archive.
//!   - `rma6 extract` print reads, optionally restricted to some classes.
//!   - `rma6 reindex` rebuild the classification indices from the stored class ids.
//!   - `rma6 aux` read or replace the auxiliary data of an archive.
//!
//! ### Rust API
//!
//! The following structs are provided:
//!
//!   - [ArchiveWriter](encoder::ArchiveWriter): writes an archive section by section.
//!   - [ArchiveReader](decoder::ArchiveReader): random access and iteration over a finished archive.
//!   - [Connector](decoder::Connector): path-based access that opens a fresh handle per query.
//!   - [Modifier](modifier::Modifier): replaces the classification or aux sections in place.
//!
//! Reading SAM files, fasta/fastq files and class mapping tables into
//! archive input is done with the functions in [input].
//!
//! For whole-archive operations see [create_archive](encoder::create_archive)
//! and [reindex].
//!
//! ## File format specification
//!
//! All integers are big-endian. Strings have an i32 length prefix, a
//! negative length `-n` means `n` bytes of zlib-compressed data follow.
//!
//! An .rma6 archive has the following structure:
//!
//!   1. Header: magic number `RMA6` (i32), version 6 (i32), minor version 0
//!      (i32), creator (string), creation date (i64, ms since the epoch),
//!      blast mode (string), paired reads (u8), number of classifications
//!      (i32) and their names (string each).
//!   2. Reads: one record per read, see [record].
//!   3. Classifications: one index block per classification, see [classification].
//!   4. Aux data: labelled blobs, see [auxdata].
//!   5. Footer: number of reads (i64), number of matches (i64), number of
//!      classification blocks (i32), name (string) and offset (i64) of each
//!      block, the start and end (i64 each) of the header, reads,
//!      classifications and aux sections, the start of the footer (i64) and
//!      the end of the footer (i64).
//!
//! The last 16 bytes of a valid archive are the start of the footer and the
//! length of the file.
//!

use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::Write;

pub mod auxdata;
pub mod classification;
pub mod compression;
pub mod decoder;
pub mod encoder;
pub mod headers;
pub mod input;
pub mod io;
pub mod modifier;
pub mod progress;
pub mod record;

use classification::ClassificationIndex;
use decoder::ArchiveReader;
use headers::footer::Footer;
use modifier::Modifier;
use record::ReadBlock;
use record::ReadOptions;

type E = Box<dyn std::error::Error>;

/// Program that produced the matches.
///
/// Only affects how query coordinates are derived from a match, for
/// [BlastX](BlastMode::BlastX) the aligned length is in amino acids.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlastMode {
    #[default]
    Unknown,
    BlastN,
    BlastP,
    BlastX,
    Classifier,
}

impl std::fmt::Display for BlastMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            BlastMode::Unknown => "Unknown",
            BlastMode::BlastN => "BlastN",
            BlastMode::BlastP => "BlastP",
            BlastMode::BlastX => "BlastX",
            BlastMode::Classifier => "Classifier",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for BlastMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(BlastMode::Unknown),
            "blastn" => Ok(BlastMode::BlastN),
            "blastp" => Ok(BlastMode::BlastP),
            "blastx" => Ok(BlastMode::BlastX),
            "classifier" => Ok(BlastMode::Classifier),
            _ => Err(format!("'{}' is not a valid BlastMode", s)),
        }
    }
}

/// Rebuild the classification indices of an archive from its stored class ids.
///
/// Scans every read record, collects the class id table of each read, and
/// replaces the classification section with one index per classification
/// named in the header. A read is assigned to every distinct non-zero id
/// in its column of the table. Class weights are reset to the read counts.
///
/// The aux data is kept.
///
/// ## Usage
///
/// ```rust
/// use rma6::BlastMode;
/// use rma6::decoder::ArchiveReader;
/// use rma6::encoder::{ArchiveWriter, WriterOptions};
/// use rma6::headers::header::Header;
/// use rma6::record::matches::MatchRecord;
/// use std::io::Cursor;
///
/// // Write an archive without classification blocks
/// let header = Header::new("example", BlastMode::BlastN, false, &["Taxonomy".to_string()]);
/// let mut archive: Cursor<Vec<u8>> = Cursor::new(Vec::new());
/// let mut writer = ArchiveWriter::new(&mut archive, header, &WriterOptions::default()).unwrap();
/// writer.write_header().unwrap();
/// writer.start_adding_queries().unwrap();
/// let matches = vec![MatchRecord{ text: "ERR4035126.1\t0\tref\t1\t255\t4M\t*\t0\t0\t*\t*".to_string(), class_ids: vec![562] }];
/// let uid = writer.add_query(">ERR4035126.1", Some("ACGT"), &matches, None).unwrap();
/// writer.close().unwrap();
///
/// // Build the "Taxonomy" index from the stored class ids
/// let footer = rma6::reindex(&mut archive).unwrap();
/// assert_eq!(footer.number_of_reads, 1);
///
/// let mut reader = ArchiveReader::new(&mut archive).unwrap();
/// assert_eq!(reader.class_locations("Taxonomy", 562).unwrap(), vec![uid]);
/// ```
///
pub fn reindex<F: Read + Write + Seek + io::SetLen>(
    mut handle: F,
) -> Result<Footer, E> {
    let (indices, aux) = {
        let mut reader = ArchiveReader::new(BufReader::new(&mut handle))?;
        let names = reader.header().classification_names.clone();
        let width = names.len();
        let mut indices: Vec<ClassificationIndex> = names.iter().map(|name| ClassificationIndex::new(name)).collect();

        let options = ReadOptions{ want_sequence: false, ..Default::default() };
        let mut reads = reader.all_reads(&options)?;
        let mut block = ReadBlock::default();
        while reads.next_into(&mut block)? {
            for (column, index) in indices.iter_mut().enumerate() {
                index.add_from_table(block.uid, &block.class_id_table, width, column);
            }
        }
        log::info!("Rebuilt {} classification indices", indices.len());

        let aux = reader.aux_data()?;
        (indices, aux)
    };

    let mut modifier = Modifier::new(&mut handle)?;
    modifier.update_classifications(&indices)?;
    let footer = if aux.is_empty() {
        modifier.footer().clone()
    } else {
        modifier.save_aux_data(&aux)?
    };
    Ok(footer)
}
