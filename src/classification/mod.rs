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

//! Classification index blocks.
//!
//! Each classification named in the footer has one block that maps class
//! ids to the uids of the reads assigned to them. A block consists of the
//! number of classes (i32) followed by, for every class in ascending id
//! order:
//!
//!   - Class id (i32).
//!   - Weight (i32), the weighted read count rounded to the nearest integer.
//!   - Number of reads (i32).
//!   - Uids of the reads (i64 each).
//!
//! The leading class count sits in front of the per-class records and is
//! not part of any of them. It bounds the scan of a block, so readers never
//! need the offset of the next block or the end of the section. Readers of
//! blocks without it see the count as the id of a first class.
//!
//! Blocks only refer to offsets in the reads section, so they can be
//! replaced without touching the reads, see [Modifier](crate::modifier::Modifier).
//!
//! There are two ways to read a block. [read_class_sizes] only collects the
//! per-class counts and skips every offset list, [read_locations] collects
//! the offsets of a single class and skips the others.
//!

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io::Read;
use std::io::Seek;
use std::io::Write;

use crate::headers::footer::Footer;
use crate::io::InputReader;
use crate::io::OutputWriter;
use crate::record::matches::MatchBlock;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct DuplicateClassification {
    pub name: String,
}

impl std::fmt::Display for DuplicateClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "classification '{}' given twice", self.name)
    }
}

impl std::error::Error for DuplicateClassification {}

/// Fails with [DuplicateClassification] if a name appears more than once.
pub fn check_unique_names<'a, I: IntoIterator<Item = &'a str>>(
    names: I,
) -> Result<(), E> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Box::new(DuplicateClassification{ name: name.to_string() }))
        }
    }
    Ok(())
}

/// Read assignments for one classification, built in memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassificationIndex {
    pub name: String,
    /// Class id to read uids, in insertion order.
    pub locations: BTreeMap<i32, Vec<u64>>,
    /// Class id to weighted read count. Classes without an entry are
    /// weighted by their read count.
    pub weights: BTreeMap<i32, f64>,
}

impl ClassificationIndex {
    pub fn new(
        name: &str,
    ) -> Self {
        ClassificationIndex{ name: name.to_string(), ..Default::default() }
    }

    pub fn add(
        &mut self,
        class_id: i32,
        uid: u64,
    ) {
        self.locations.entry(class_id).or_default().push(uid);
    }

    pub fn add_weighted(
        &mut self,
        class_id: i32,
        uid: u64,
        weight: f64,
    ) {
        self.add(class_id, uid);
        *self.weights.entry(class_id).or_insert(0.0) += weight;
    }

    /// Assigns the read `uid` to every distinct non-zero id in `class_ids`.
    pub fn add_read<I: IntoIterator<Item = i32>>(
        &mut self,
        uid: u64,
        class_ids: I,
    ) {
        let mut ids: Vec<i32> = class_ids.into_iter().filter(|id| *id != 0).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().for_each(|id| self.add(id, uid));
    }

    /// Assigns the read `uid` to every distinct non-zero class id found in
    /// `column` of the matches' class ids.
    pub fn add_from_matches(
        &mut self,
        uid: u64,
        matches: &[MatchBlock],
        column: usize,
    ) {
        self.add_read(uid, matches.iter().map(|m| m.class_id(column)));
    }

    /// Assigns the read `uid` using `column` of a stored class id table
    /// with `width` columns.
    pub fn add_from_table(
        &mut self,
        uid: u64,
        table: &[i32],
        width: usize,
        column: usize,
    ) {
        if width == 0 {
            return
        }
        self.add_read(uid, table.chunks(width).filter_map(|row| row.get(column).copied()));
    }

    pub fn weight(
        &self,
        class_id: i32,
    ) -> f64 {
        match self.weights.get(&class_id) {
            Some(weight) => *weight,
            None => self.locations.get(&class_id).map(|uids| uids.len() as f64).unwrap_or(0.0),
        }
    }
}

/// Per-class read counts of a classification, without the read locations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassificationSummary {
    pub name: String,
    /// Class id to (read count, rounded weight).
    pub sizes: BTreeMap<i32, (u32, i32)>,
}

impl ClassificationSummary {
    pub fn class_ids(&self) -> Vec<i32> {
        self.sizes.keys().copied().collect()
    }

    pub fn class_size(
        &self,
        class_id: i32,
    ) -> u32 {
        self.sizes.get(&class_id).map(|x| x.0).unwrap_or(0)
    }

    pub fn class_weight(
        &self,
        class_id: i32,
    ) -> i32 {
        self.sizes.get(&class_id).map(|x| x.1).unwrap_or(0)
    }
}

/// Writes `index` as a classification block at the current position.
///
/// Classes are written in ascending id order, so writing the same index
/// twice produces the same bytes.
pub fn write_classification_block<W: Write + Seek>(
    writer: &mut OutputWriter<W>,
    index: &ClassificationIndex,
) -> Result<(), E> {
    writer.write_i32(index.locations.len() as i32)?;
    for (class_id, uids) in index.locations.iter() {
        writer.write_i32(*class_id)?;
        writer.write_i32(index.weight(*class_id).round() as i32)?;
        writer.write_i32(uids.len() as i32)?;
        for uid in uids.iter() {
            writer.write_i64(*uid as i64)?;
        }
    }
    log::debug!("Wrote {} classes for {}", index.locations.len(), index.name);
    Ok(())
}

/// Writes every index as a block at the current position and records the
/// block offsets and the section boundaries in `footer`.
///
/// Offsets of previously written blocks are discarded from `footer`.
/// Nothing is written if two indices have the same name.
pub fn write_classification_section<W: Write + Seek>(
    writer: &mut OutputWriter<W>,
    indices: &[ClassificationIndex],
    footer: &mut Footer,
) -> Result<(), E> {
    check_unique_names(indices.iter().map(|index| index.name.as_str()))?;
    footer.classification_offsets.clear();
    footer.regions.start_classifications = writer.position();
    for index in indices.iter() {
        footer.classification_offsets.insert(index.name.clone(), writer.position());
        write_classification_block(writer, index)?;
    }
    footer.regions.end_classifications = writer.position();
    log::info!("Wrote {} classification blocks", indices.len());
    Ok(())
}

fn read_class_count<R: Read + Seek>(
    reader: &mut InputReader<R>,
) -> Result<usize, E> {
    let n_classes = reader.read_i32()?;
    if n_classes < 0 {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("negative class count {}", n_classes),
        )))
    }
    Ok(n_classes as usize)
}

fn read_size<R: Read + Seek>(
    reader: &mut InputReader<R>,
) -> Result<u64, E> {
    let size = reader.read_i32()?;
    if size < 0 {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("negative class size {}", size),
        )))
    }
    Ok(size as u64)
}

/// Reads the class sizes of the block at `position`.
///
/// Skips every offset list, nothing but the class headers is read.
pub fn read_class_sizes<R: Read + Seek>(
    reader: &mut InputReader<R>,
    name: &str,
    position: u64,
) -> Result<ClassificationSummary, E> {
    reader.seek(position)?;
    let n_classes = read_class_count(reader)?;

    let mut sizes: BTreeMap<i32, (u32, i32)> = BTreeMap::new();
    for _ in 0..n_classes {
        let class_id = reader.read_i32()?;
        let weight = reader.read_i32()?;
        let size = read_size(reader)?;
        reader.skip_bytes(size * 8)?;
        sizes.insert(class_id, (size as u32, weight));
    }

    Ok(ClassificationSummary{ name: name.to_string(), sizes })
}

/// Appends the uids of the reads assigned to `class_id` to `out`.
///
/// Scans the block at `position`, reading only the offset list of
/// `class_id`. Returns the number of uids added.
pub fn read_locations<R: Read + Seek>(
    reader: &mut InputReader<R>,
    position: u64,
    class_id: i32,
    out: &mut Vec<u64>,
) -> Result<usize, E> {
    reader.seek(position)?;
    let n_classes = read_class_count(reader)?;

    for _ in 0..n_classes {
        let id = reader.read_i32()?;
        let _weight = reader.read_i32()?;
        let size = read_size(reader)?;
        if id == class_id {
            for _ in 0..size {
                out.push(reader.read_offset()?);
            }
            return Ok(size as usize)
        }
        reader.skip_bytes(size * 8)?;
    }

    Ok(0)
}

// Tests
#[cfg(test)]
mod tests {

    fn mock_index() -> super::ClassificationIndex {
        use super::ClassificationIndex;

        let mut index = ClassificationIndex::new("Taxonomy");
        index.add(7, 100);
        index.add(5, 100);
        index.add(5, 300);
        index.add_weighted(2, 200, 2.6);
        index
    }

    #[test]
    fn write_classification_block() {
        use super::write_classification_block;
        use crate::compression::Compression;
        use crate::io::OutputWriter;
        use std::io::Cursor;

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        write_classification_block(&mut writer, &mock_index()).unwrap();

        // Class count, then classes 2, 5 and 7
        let expected: Vec<u8> = vec![
            0, 0, 0, 3,
            0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 200,
            0, 0, 0, 5, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 100, 0, 0, 0, 0, 0, 0, 1, 44,
            0, 0, 0, 7, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 100,
        ];
        assert_eq!(writer.into_inner().into_inner(), expected);
    }

    #[test]
    fn read_class_sizes_skips_offsets() {
        use super::read_class_sizes;
        use super::write_classification_block;
        use crate::compression::Compression;
        use crate::io::{InputReader, OutputWriter};
        use std::io::Cursor;

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        writer.write_bytes(&[0_u8; 4]).unwrap();
        write_classification_block(&mut writer, &mock_index()).unwrap();
        let end = writer.position();

        let mut reader = InputReader::new(writer.into_inner()).unwrap();
        let got = read_class_sizes(&mut reader, "Taxonomy", 4).unwrap();

        assert_eq!(reader.position().unwrap(), end);
        assert_eq!(got.class_ids(), vec![2, 5, 7]);
        assert_eq!(got.class_size(5), 2);
        assert_eq!(got.class_weight(5), 2);
        assert_eq!(got.class_weight(2), 3);
        assert_eq!(got.class_size(8), 0);
    }

    #[test]
    fn read_locations_of_one_class() {
        use super::read_locations;
        use super::write_classification_block;
        use crate::compression::Compression;
        use crate::io::{InputReader, OutputWriter};
        use std::io::Cursor;

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        write_classification_block(&mut writer, &mock_index()).unwrap();
        let mut reader = InputReader::new(writer.into_inner()).unwrap();

        let mut got: Vec<u64> = Vec::new();
        assert_eq!(read_locations(&mut reader, 0, 5, &mut got).unwrap(), 2);
        assert_eq!(got, vec![100, 300]);

        assert_eq!(read_locations(&mut reader, 0, 7, &mut got).unwrap(), 1);
        assert_eq!(got, vec![100, 300, 100]);

        assert_eq!(read_locations(&mut reader, 0, 42, &mut got).unwrap(), 0);
    }

    #[test]
    fn add_from_table_uses_one_column() {
        use super::ClassificationIndex;

        let table = vec![5, 1, 5, 0, 0, 3, 7, 3];
        let mut index = ClassificationIndex::new("Taxonomy");
        index.add_from_table(10, &table, 2, 0);
        index.add_from_table(20, &[], 2, 0);
        let mut other = ClassificationIndex::new("EC");
        other.add_from_table(10, &table, 2, 1);

        assert_eq!(index.locations.into_iter().collect::<Vec<(i32, Vec<u64>)>>(), vec![(5, vec![10]), (7, vec![10])]);
        assert_eq!(other.locations.into_iter().collect::<Vec<(i32, Vec<u64>)>>(), vec![(1, vec![10]), (3, vec![10])]);
    }

    #[test]
    fn section_records_block_offsets() {
        use super::{ClassificationIndex, read_class_sizes, write_classification_section};
        use crate::compression::Compression;
        use crate::headers::footer::Footer;
        use crate::io::{InputReader, OutputWriter};
        use std::io::Cursor;

        let mut ec = ClassificationIndex::new("EC");
        ec.add(3, 100);
        let indices = vec![mock_index(), ec];

        let mut footer = Footer::default();
        footer.classification_offsets.insert("Stale".to_string(), 1);
        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        writer.write_bytes(&[0_u8; 8]).unwrap();
        write_classification_section(&mut writer, &indices, &mut footer).unwrap();

        assert_eq!(footer.regions.start_classifications, 8);
        assert_eq!(footer.regions.end_classifications, writer.position());
        assert_eq!(footer.classification_offsets.keys().cloned().collect::<Vec<String>>(), vec!["Taxonomy", "EC"]);

        let mut reader = InputReader::new(writer.into_inner()).unwrap();
        let ec_offset = *footer.classification_offsets.get("EC").unwrap();
        let got = read_class_sizes(&mut reader, "EC", ec_offset).unwrap();
        assert_eq!(got.class_ids(), vec![3]);
    }

    #[test]
    fn section_rejects_duplicate_names() {
        use super::{DuplicateClassification, write_classification_section};
        use crate::compression::Compression;
        use crate::headers::footer::Footer;
        use crate::io::OutputWriter;
        use std::io::Cursor;

        let mut footer = Footer::default();
        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        let got = write_classification_section(&mut writer, &[mock_index(), mock_index()], &mut footer);
        assert!(got.err().unwrap().downcast_ref::<DuplicateClassification>().is_some());
        assert_eq!(writer.position(), 0);
        assert_eq!(footer, Footer::default());
    }

    #[test]
    fn unique_names() {
        use super::check_unique_names;

        assert!(check_unique_names(["Taxonomy", "EC", "SEED"]).is_ok());
        assert!(check_unique_names(["Taxonomy", "EC", "Taxonomy"]).is_err());
        assert!(check_unique_names(Vec::<&str>::new()).is_ok());
    }

    #[test]
    fn add_from_matches_dedups() {
        use super::ClassificationIndex;
        use crate::record::matches::MatchBlock;

        let matches = vec![
            MatchBlock{ class_ids: vec![5, 1], ..Default::default() },
            MatchBlock{ class_ids: vec![5, 0], ..Default::default() },
            MatchBlock{ class_ids: vec![0, 3], ..Default::default() },
        ];
        let mut index = ClassificationIndex::new("Taxonomy");
        index.add_from_matches(10, &matches, 0);
        let mut other = ClassificationIndex::new("EC");
        other.add_from_matches(10, &matches, 1);

        assert_eq!(index.locations.into_iter().collect::<Vec<(i32, Vec<u64>)>>(), vec![(5, vec![10])]);
        assert_eq!(other.locations.into_iter().collect::<Vec<(i32, Vec<u64>)>>(), vec![(1, vec![10]), (3, vec![10])]);
    }
}
