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

//! Per-read records stored in the reads section.
//!
//! A record consists of, in order:
//!
//!   - Offset of the mate record (i64), only if the archive contains paired reads.
//!   - Read header and sequence joined by a newline (compressible string).
//!   - Number of matches (i32).
//!   - Class id table: one i32 per match and classification, never compressed.
//!   - Matches as SAM lines joined by newlines (compressible string).
//!
//! The offset of a record in the archive is its unique identifier (uid).
//!

pub mod matches;

use std::io::Read;
use std::io::Seek;
use std::io::Write;

use crate::BlastMode;
use crate::headers::header::Header;
use crate::io::InputReader;
use crate::io::OutputWriter;

use matches::MatchBlock;
use matches::MatchRecord;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct RecordError {
    pub message: String,
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "invalid read record: {}", self.message)
    }
}

impl std::error::Error for RecordError {}

/// What a record looks like in a given archive, derived from its [Header].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordLayout {
    pub paired_reads: bool,
    pub n_classifications: usize,
    pub blast_mode: BlastMode,
}

impl RecordLayout {
    pub fn from_header(
        header: &Header,
    ) -> Self {
        RecordLayout{
            paired_reads: header.paired_reads,
            n_classifications: header.n_classifications(),
            blast_mode: header.blast_mode,
        }
    }
}

/// Which parts of a record to decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadOptions {
    pub want_sequence: bool,
    /// If false the class id table and match text are skipped undecoded.
    pub want_matches: bool,
    /// Matches with a lower bit score are dropped after decoding.
    pub min_score: f32,
    /// Matches with a higher expected value are dropped after decoding.
    pub max_expected: f64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions{ want_sequence: true, want_matches: true, min_score: 0.0, max_expected: f64::MAX }
    }
}

impl ReadOptions {
    /// Read names and mates only, the fast path for classification scans.
    ///
    /// Without decoded matches a read stored without a sequence gets a
    /// [read_length](ReadBlock::read_length) of 1, which is not its real
    /// length.
    pub fn headers_only() -> Self {
        ReadOptions{ want_sequence: false, want_matches: false, ..Default::default() }
    }
}

/// A decoded read record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadBlock {
    /// Offset of this record in the archive.
    pub uid: u64,
    /// Offset of the mate record.
    pub mate_uid: Option<u64>,
    pub read_header: String,
    pub read_sequence: Option<String>,
    /// Never 0, see [ReadBlock::read_into]. A placeholder of 1 if neither a
    /// sequence nor decoded matches were available.
    pub read_length: u32,
    /// Number of matches stored in the record, also when they were not decoded.
    pub total_matches: usize,
    pub matches: Vec<MatchBlock>,
    /// The stored class id table, one row per stored match and one column
    /// per classification. Kept unfiltered, empty if matches were skipped.
    pub class_id_table: Vec<i32>,
}

impl ReadBlock {
    /// Name of the read: the header up to the first whitespace, without `>` or `@`.
    pub fn read_name(&self) -> &str {
        let header = self.read_header.trim_start_matches(['>', '@']);
        header.split_whitespace().next().unwrap_or("")
    }

    /// Decodes the record at the current position of `reader` into a new block.
    pub fn read_from<R: Read + Seek>(
        reader: &mut InputReader<R>,
        layout: &RecordLayout,
        options: &ReadOptions,
    ) -> Result<Self, E> {
        let mut block = ReadBlock::default();
        block.read_into(reader, layout, options)?;
        Ok(block)
    }

    /// Decodes the record at the current position of `reader` into `self`.
    ///
    /// Reuses the allocations of `self`. Leaves `reader` positioned at the
    /// next record, also when the matches are skipped.
    ///
    /// The read length is the sequence length if a sequence was stored,
    /// otherwise the largest query end among the decoded matches, otherwise 1.
    pub fn read_into<R: Read + Seek>(
        &mut self,
        reader: &mut InputReader<R>,
        layout: &RecordLayout,
        options: &ReadOptions,
    ) -> Result<(), E> {
        self.uid = reader.position()?;
        self.mate_uid = if layout.paired_reads {
            let mate = reader.read_i64()?;
            if mate > 0 { Some(mate as u64) } else { None }
        } else {
            None
        };

        let text = reader.read_utf8()?;
        let (header, sequence) = match text.split_once('\n') {
            Some((header, sequence)) => (header, Some(sequence)),
            None => (text.as_str(), None),
        };
        self.read_header.clear();
        self.read_header.push_str(header);
        let sequence_length = sequence.map(|s| s.len()).unwrap_or(0);
        self.read_sequence = if options.want_sequence { sequence.map(|s| s.to_string()) } else { None };

        let n_matches = reader.read_i32()?;
        if n_matches < 0 {
            return Err(Box::new(RecordError{ message: format!("negative match count {} at {}", n_matches, self.uid) }))
        }
        self.total_matches = n_matches as usize;
        self.matches.clear();

        let table_len = self.total_matches * layout.n_classifications;
        if table_len as u64 * 4 > reader.length() {
            return Err(Box::new(RecordError{ message: format!("match count {} at {} exceeds the archive", n_matches, self.uid) }))
        }
        self.class_id_table.clear();
        if !options.want_matches {
            reader.skip_bytes(table_len as u64 * 4)?;
            reader.skip_string()?;
        } else {
            let mut table = std::mem::take(&mut self.class_id_table);
            table.reserve(table_len);
            for _ in 0..table_len {
                table.push(reader.read_i32()?);
            }
            let text = reader.read_utf8()?;
            self.decode_matches(&text, &table, layout);
            self.class_id_table = table;
        }

        let aligned_length = self.matches.iter().map(|m| m.query_start.max(m.query_end)).max().unwrap_or(0);
        self.read_length = if sequence_length > 0 {
            sequence_length as u32
        } else if aligned_length > 0 {
            aligned_length
        } else {
            1
        };

        if options.want_matches {
            self.matches.retain(|m| m.bit_score >= options.min_score && m.expected <= options.max_expected);
        }

        Ok(())
    }

    fn decode_matches(
        &mut self,
        text: &str,
        table: &[i32],
        layout: &RecordLayout,
    ) {
        if self.total_matches == 0 {
            return
        }
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() != self.total_matches {
            log::warn!("Read at {} stores {} matches but {} match lines", self.uid, self.total_matches, lines.len());
        }
        let width = layout.n_classifications;
        for (idx, line) in lines.iter().take(self.total_matches).enumerate() {
            let ids = &table[(idx * width)..((idx + 1) * width)];
            match MatchBlock::parse(line, ids, layout.blast_mode) {
                Ok(block) => self.matches.push(block),
                Err(e) => log::warn!("Skipping match {} of read at {}: {}", idx, self.uid, e),
            }
        }
    }
}

/// Writes a read record at the current position of `writer`.
///
/// Returns the uid of the written record. Nothing is written if the input
/// does not fit `layout`: every match must have one class id per
/// classification, a mate may only be given in a paired archive, and
/// neither the header nor the match lines may contain newlines.
pub fn write_read_record<W: Write + Seek>(
    writer: &mut OutputWriter<W>,
    layout: &RecordLayout,
    mate_uid: Option<u64>,
    read_header: &str,
    read_sequence: Option<&str>,
    matches: &[MatchRecord],
) -> Result<u64, E> {
    if mate_uid.is_some() && !layout.paired_reads {
        return Err(Box::new(RecordError{ message: format!("read '{}' has a mate but the archive is not paired", read_header) }))
    }
    if read_header.contains('\n') {
        return Err(Box::new(RecordError{ message: format!("read header '{}' contains a newline", read_header) }))
    }
    for record in matches.iter() {
        if record.class_ids.len() != layout.n_classifications {
            return Err(Box::new(RecordError{ message: format!("match of '{}' has {} class ids, expected {}", read_header, record.class_ids.len(), layout.n_classifications) }))
        }
        if record.text.contains('\n') {
            return Err(Box::new(RecordError{ message: format!("match of '{}' spans multiple lines", read_header) }))
        }
    }

    let uid = writer.position();
    if layout.paired_reads {
        writer.write_i64(mate_uid.unwrap_or(0) as i64)?;
    }

    let mut text = String::with_capacity(read_header.len() + 1 + read_sequence.map(|s| s.len()).unwrap_or(0));
    text.push_str(read_header);
    if let Some(sequence) = read_sequence.filter(|s| !s.is_empty()) {
        text.push('\n');
        text.push_str(sequence);
    }
    writer.write_string(text.as_bytes())?;

    writer.write_i32(matches.len() as i32)?;
    for record in matches.iter() {
        for id in record.class_ids.iter() {
            writer.write_i32(*id)?;
        }
    }

    let lines = matches.iter().map(|record| record.text.as_str()).collect::<Vec<&str>>().join("\n");
    writer.write_string(lines.as_bytes())?;

    Ok(uid)
}
