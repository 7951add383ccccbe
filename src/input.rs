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

//! Turning plain text inputs into [QueryRecord]s for
//! [create_archive](crate::encoder::create_archive).
//!
//! Three inputs are supported:
//!
//!   - A [SAM](https://samtools.github.io/hts-specs/SAMv1.pdf) file with
//!     the matches, grouped into reads by query name.
//!   - Mapping tables, one per classification, with a reference name and a
//!     class id on each line. References missing from a table get class 0.
//!   - Optionally the reads as fasta or fastq, read with needletail.
//!
//! Mates are recognized by the `/1` and `/2` suffixes of the read names.
//!

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use bstr::ByteSlice;
use bstr::io::BufReadExt;
use indexmap::IndexMap;
use noodles_sam as sam;
use noodles_sam::alignment::record::Flags;

use crate::encoder::QueryRecord;
use crate::record::matches::MatchRecord;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct InputError {
    pub message: String,
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for InputError {}

/// Reference name to class id for one classification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassMapping {
    pub name: String,
    ids: HashMap<String, i32>,
}

impl ClassMapping {
    pub fn new(
        name: &str,
    ) -> Self {
        ClassMapping{ name: name.to_string(), ids: HashMap::new() }
    }

    /// Reads a whitespace separated table of reference names and class ids.
    ///
    /// Empty lines and lines starting with `#` are skipped.
    pub fn read<R: BufRead>(
        name: &str,
        conn: R,
    ) -> Result<Self, E> {
        let mut mapping = ClassMapping::new(name);
        for (idx, line) in conn.byte_lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with(b"#") {
                continue
            }

            let mut fields = line.fields();
            let (reference, id) = match (fields.next(), fields.next()) {
                (Some(reference), Some(id)) => (reference, id),
                _ => return Err(Box::new(InputError{ message: format!("line {} of mapping {} has fewer than two columns", idx + 1, name) })),
            };
            let id = id.to_str_lossy().parse::<i32>().map_err(|e| {
                Box::new(InputError{ message: format!("line {} of mapping {}: {}", idx + 1, name, e) }) as E
            })?;
            mapping.insert(&reference.to_str_lossy(), id);
        }
        log::debug!("Read {} references for {}", mapping.len(), name);
        Ok(mapping)
    }

    pub fn insert(
        &mut self,
        reference: &str,
        class_id: i32,
    ) {
        self.ids.insert(reference.to_string(), class_id);
    }

    /// Class id of `reference`, 0 if it is not in the table.
    pub fn class_id(
        &self,
        reference: &str,
    ) -> i32 {
        self.ids.get(reference).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The SAM lines of one read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SamGroup {
    /// Lines of mapped records.
    pub lines: Vec<String>,
    /// Sequence from the first primary record that stores one.
    pub sequence: Option<String>,
}

/// Name of the read `qname` refers to, with a `/1` or `/2` suffix added
/// for paired segments that lack one.
fn query_key(
    qname: &str,
    flags: Flags,
) -> String {
    if mate_of(qname).is_some() || !flags.is_segmented() {
        qname.to_string()
    } else if flags.is_first_segment() {
        format!("{}/1", qname)
    } else if flags.is_last_segment() {
        format!("{}/2", qname)
    } else {
        qname.to_string()
    }
}

/// Name of the other mate if `name` ends with `/1` or `/2`.
pub fn mate_of(
    name: &str,
) -> Option<String> {
    if let Some(base) = name.strip_suffix("/1") {
        Some(format!("{}/2", base))
    } else {
        name.strip_suffix("/2").map(|base| format!("{}/1", base))
    }
}

/// Reads a SAM file into groups of lines keyed by read name.
///
/// Header lines are skipped. Unmapped records do not contribute lines but
/// still create a group, so reads without matches are kept.
pub fn read_sam_groups<R: BufRead>(
    conn: R,
) -> Result<IndexMap<String, SamGroup>, E> {
    let mut groups: IndexMap<String, SamGroup> = IndexMap::new();
    for (idx, line) in conn.byte_lines().enumerate() {
        let line = line?;
        let line = line.trim_end_with(|c| c == '\r');
        if line.is_empty() || line.starts_with(b"@") {
            continue
        }

        let record = sam::Record::try_from(line.as_bytes()).map_err(|e| {
            Box::new(InputError{ message: format!("SAM line {}: {}", idx + 1, e) }) as E
        })?;
        let flags = record.flags().map_err(|e| {
            Box::new(InputError{ message: format!("SAM line {}: bad flags: {}", idx + 1, e) }) as E
        })?;
        let qname = match record.name() {
            Some(name) => name.to_string(),
            None => return Err(Box::new(InputError{ message: format!("SAM line {} has no query name", idx + 1) })),
        };

        let group = groups.entry(query_key(&qname, flags)).or_default();
        let primary = !flags.is_secondary() && !flags.is_supplementary();
        if group.sequence.is_none() && primary && !record.sequence().is_empty() {
            group.sequence = Some(record.sequence().as_ref().to_str_lossy().to_string());
        }
        if !flags.is_unmapped() && record.reference_sequence_name().is_some() {
            group.lines.push(line.to_str_lossy().to_string());
        }
    }
    log::info!("Read matches for {} queries", groups.len());
    Ok(groups)
}

/// Attaches the class ids of every classification to the SAM lines.
pub fn match_records(
    lines: &[String],
    mappings: &[ClassMapping],
) -> Vec<MatchRecord> {
    lines.iter().map(|line| {
        let reference = sam::Record::try_from(line.as_bytes()).ok()
            .and_then(|record| record.reference_sequence_name().map(|name| name.to_string()));
        MatchRecord{
            text: line.clone(),
            class_ids: mappings.iter().map(|mapping| {
                reference.as_deref().map(|name| mapping.class_id(name)).unwrap_or(0)
            }).collect(),
        }
    }).collect()
}

/// A read from a fasta or fastq file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadInput {
    /// Header line with the leading `>`.
    pub header: String,
    pub sequence: Option<String>,
}

impl ReadInput {
    /// First word of the header.
    pub fn name(&self) -> &str {
        self.header.trim_start_matches(['>', '@']).split_whitespace().next().unwrap_or("")
    }
}

/// Reads every record of a fasta or fastq file.
pub fn read_fastx<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<ReadInput>, E> {
    let mut reader = needletail::parse_fastx_file(path)?;
    let mut reads: Vec<ReadInput> = Vec::new();
    while let Some(record) = reader.next() {
        let record = record?;
        reads.push(ReadInput{
            header: format!(">{}", String::from_utf8_lossy(record.id())),
            sequence: Some(String::from_utf8_lossy(&record.seq()).to_string()),
        });
    }
    log::info!("Read {} sequences", reads.len());
    Ok(reads)
}

/// Combines reads and SAM groups into archive input.
///
/// If `reads` is given the records follow the order of the reads, and SAM
/// groups without a read are appended after them. Otherwise the records
/// follow the SAM file and the sequences stored there.
///
/// With `paired` the second mate seen of each pair points at the first.
pub fn query_records(
    mut groups: IndexMap<String, SamGroup>,
    reads: Option<Vec<ReadInput>>,
    mappings: &[ClassMapping],
    paired: bool,
) -> Vec<QueryRecord> {
    let mut inputs: Vec<(String, ReadInput, Vec<String>)> = Vec::new();
    if let Some(reads) = reads {
        for read in reads {
            let name = read.name().to_string();
            let lines = groups.shift_remove(&name).map(|group| group.lines).unwrap_or_default();
            inputs.push((name, read, lines));
        }
        if !groups.is_empty() {
            log::warn!("{} queries in the SAM file have no sequence", groups.len());
        }
    }
    for (name, group) in groups {
        let read = ReadInput{ header: format!(">{}", name), sequence: group.sequence };
        inputs.push((name, read, group.lines));
    }

    let mut first_mates: HashMap<String, usize> = HashMap::new();
    inputs.into_iter().enumerate().map(|(idx, (name, read, lines))| {
        let mate = if paired {
            match mate_of(&name).and_then(|other| first_mates.remove(&other)) {
                Some(mate_idx) => Some(mate_idx),
                None => {
                    first_mates.insert(name, idx);
                    None
                },
            }
        } else {
            None
        };
        QueryRecord{
            read_header: read.header,
            read_sequence: read.sequence,
            matches: match_records(&lines, mappings),
            mate,
        }
    }).collect()
}
