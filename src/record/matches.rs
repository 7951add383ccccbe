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
use noodles_sam as sam;
use noodles_sam::alignment::record::Cigar as _;
use noodles_sam::alignment::record::Data as _;
use noodles_sam::alignment::record::cigar::op::Kind;
use noodles_sam::alignment::record::data::field::Tag;
use noodles_sam::alignment::record::data::field::Value;

use crate::BlastMode;

type E = Box<dyn std::error::Error>;

const TAG_EXPECTED: Tag = Tag::new(b'Z', b'E');
const TAG_PERCENT_IDENTITY: Tag = Tag::new(b'Z', b'I');
const TAG_QUERY_START: Tag = Tag::new(b'Z', b'S');
const TAG_REFERENCE_LENGTH: Tag = Tag::new(b'Z', b'L');

#[derive(Debug, Clone)]
pub struct MatchParseError {
    pub message: String,
}

impl std::fmt::Display for MatchParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "unparsable match line: {}", self.message)
    }
}

impl std::error::Error for MatchParseError {}

/// A match (alignment) as given to the writer.
///
/// `text` is one [SAM](https://samtools.github.io/hts-specs/SAMv1.pdf)
/// line without the trailing newline. `class_ids` has one entry per
/// classification in the archive header, 0 for "no class".
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MatchRecord {
    pub text: String,
    pub class_ids: Vec<i32>,
}

/// A match decoded from a read record.
///
/// Parsed on demand from the stored SAM line. The following optional
/// fields are recognized:
///
///   - `AS:i` bit score
///   - `ZE:f` expected value
///   - `ZI:i` percent identity
///   - `ZS:i` 1-based start of the alignment on the query
///   - `ZL:i` length of the reference sequence
///
/// Missing values are 0, except the query start which falls back to the
/// first position after leading clipping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchBlock {
    pub reference_name: String,
    pub bit_score: f32,
    pub expected: f64,
    pub percent_identity: f32,
    pub query_start: u32,
    pub query_end: u32,
    pub reference_length: u32,
    pub class_ids: Vec<i32>,
    pub(crate) text: String,
}

impl MatchBlock {
    pub fn parse(
        line: &str,
        class_ids: &[i32],
        blast_mode: BlastMode,
    ) -> Result<Self, E> {
        let record = sam::Record::try_from(line.as_bytes())
            .map_err(|e| Box::new(MatchParseError{ message: e.to_string() }) as E)?;

        if record.flags()?.is_unmapped() {
            return Err(Box::new(MatchParseError{ message: "record is unmapped".to_string() }))
        }

        let reference_name = match record.reference_sequence_name() {
            Some(name) => name.to_string(),
            None => return Err(Box::new(MatchParseError{ message: "missing reference name".to_string() })),
        };

        let mut leading_clip: usize = 0;
        let mut aligned: usize = 0;
        for op in record.cigar().iter() {
            let op = op?;
            match op.kind() {
                Kind::SoftClip | Kind::HardClip => {
                    if aligned == 0 {
                        leading_clip += op.len();
                    }
                },
                Kind::Match | Kind::Insertion | Kind::SequenceMatch | Kind::SequenceMismatch => {
                    aligned += op.len();
                },
                _ => {},
            }
        }

        let data = record.data();
        let bit_score = number(data.get(&Tag::ALIGNMENT_SCORE))?.unwrap_or(0.0) as f32;
        let expected = number(data.get(&TAG_EXPECTED))?.unwrap_or(0.0);
        let percent_identity = number(data.get(&TAG_PERCENT_IDENTITY))?.unwrap_or(0.0) as f32;
        let reference_length = number(data.get(&TAG_REFERENCE_LENGTH))?.unwrap_or(0.0) as u32;

        let query_start: u64 = match number(data.get(&TAG_QUERY_START))? {
            Some(start) if (0.0..=u32::MAX as f64).contains(&start) => start as u64,
            Some(start) => return Err(Box::new(MatchParseError{ message: format!("query start {} is out of range", start) })),
            None => leading_clip as u64 + 1,
        };
        let span = match blast_mode {
            BlastMode::BlastX => aligned as u64 * 3,
            _ => aligned as u64,
        };
        let query_end = if span > 0 { query_start + span - 1 } else { query_start };
        let (query_start, query_end) = match (u32::try_from(query_start), u32::try_from(query_end)) {
            (Ok(start), Ok(end)) => (start, end),
            _ => return Err(Box::new(MatchParseError{ message: format!("query end {} is out of range", query_end) })),
        };

        Ok(MatchBlock{
            reference_name, bit_score, expected, percent_identity,
            query_start, query_end, reference_length,
            class_ids: class_ids.to_vec(),
            text: line.to_string(),
        })
    }

    /// The stored SAM line.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Class id in the given id-table column, 0 if the column does not exist.
    pub fn class_id(&self, column: usize) -> i32 {
        self.class_ids.get(column).copied().unwrap_or(0)
    }
}

fn number(
    value: Option<std::io::Result<Value<'_>>>,
) -> Result<Option<f64>, E> {
    let value = match value {
        Some(value) => value?,
        None => return Ok(None),
    };
    let res = match value {
        Value::Int8(n) => Some(f64::from(n)),
        Value::UInt8(n) => Some(f64::from(n)),
        Value::Int16(n) => Some(f64::from(n)),
        Value::UInt16(n) => Some(f64::from(n)),
        Value::Int32(n) => Some(f64::from(n)),
        Value::UInt32(n) => Some(f64::from(n)),
        Value::Float(n) => Some(f64::from(n)),
        Value::String(s) => s.to_string().parse::<f64>().ok(),
        _ => None,
    };
    Ok(res)
}
