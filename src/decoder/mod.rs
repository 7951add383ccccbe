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

//! Reading finished archives.
//!
//! [ArchiveReader] wraps a single handle. [Connector] only remembers the
//! path and opens a new read-only handle for every query, so any number of
//! connectors and iterators can read the same archive at once.
//!
//! Opening an archive validates the header and the footer. An archive whose
//! writing was interrupted before the footer was written cannot be opened.
//!

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use roaring::RoaringTreemap;

use crate::auxdata::read_aux_block;
use crate::classification::ClassificationSummary;
use crate::classification::read_class_sizes;
use crate::classification::read_locations;
use crate::headers::footer::Footer;
use crate::headers::header::Header;
use crate::io::InputReader;
use crate::record::ReadBlock;
use crate::record::ReadOptions;
use crate::record::RecordError;
use crate::record::RecordLayout;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct UnknownClassification {
    pub name: String,
}

impl std::fmt::Display for UnknownClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "archive has no classification named '{}'", self.name)
    }
}

impl std::error::Error for UnknownClassification {}

fn fraction(
    position: u64,
    start: u64,
    end: u64,
) -> f64 {
    if end <= start {
        return 1.0
    }
    (position.clamp(start, end) - start) as f64 / (end - start) as f64
}

fn check_uid(
    uid: u64,
    footer: &Footer,
) -> Result<(), E> {
    if uid < footer.regions.start_reads || uid >= footer.regions.end_reads {
        return Err(Box::new(RecordError{ message: format!("uid {} is outside the reads section", uid) }))
    }
    Ok(())
}

/// Iterates over every read in the order they were written.
pub struct AllReadsIterator<R: Read + Seek> {
    reader: InputReader<R>,
    layout: RecordLayout,
    options: ReadOptions,
    start: u64,
    end: u64,
    position: u64,
}

impl<R: Read + Seek> AllReadsIterator<R> {
    fn new(
        mut reader: InputReader<R>,
        layout: RecordLayout,
        options: ReadOptions,
        footer: &Footer,
    ) -> Result<Self, E> {
        let start = footer.regions.start_reads;
        reader.seek(start)?;
        Ok(AllReadsIterator{ reader, layout, options, start, end: footer.regions.end_reads, position: start })
    }

    /// Decodes the next read into `block`, reusing its allocations.
    ///
    /// Returns false once all reads have been read.
    pub fn next_into(
        &mut self,
        block: &mut ReadBlock,
    ) -> Result<bool, E> {
        if self.position >= self.end {
            return Ok(false)
        }
        let res = block.read_into(&mut self.reader, &self.layout, &self.options)
            .and_then(|_| self.reader.position());
        match res {
            Ok(position) => {
                self.position = position;
                Ok(true)
            },
            Err(e) => {
                self.position = self.end;
                Err(e)
            },
        }
    }

    /// Fraction of the reads section consumed so far, in [0, 1].
    pub fn progress(&self) -> f64 {
        fraction(self.position, self.start, self.end)
    }
}

impl<R: Read + Seek> Iterator for AllReadsIterator<R> {
    type Item = Result<ReadBlock, E>;

    fn next(
        &mut self,
    ) -> Option<Result<ReadBlock, E>> {
        let mut block = ReadBlock::default();
        match self.next_into(&mut block) {
            Ok(true) => Some(Ok(block)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Iterates over the reads assigned to some classes, in uid order.
///
/// A read assigned to several of the requested classes is returned once.
pub struct ClassReadsIterator<R: Read + Seek> {
    reader: InputReader<R>,
    layout: RecordLayout,
    options: ReadOptions,
    footer: Footer,
    uids: Vec<u64>,
    index: usize,
}

impl<R: Read + Seek> ClassReadsIterator<R> {
    fn new(
        mut reader: InputReader<R>,
        layout: RecordLayout,
        options: ReadOptions,
        footer: &Footer,
        name: &str,
        class_ids: &[i32],
    ) -> Result<Self, E> {
        let position = block_position(footer, name)?;

        let mut locations: Vec<u64> = Vec::new();
        for class_id in class_ids.iter() {
            read_locations(&mut reader, position, *class_id, &mut locations)?;
        }
        let uids: RoaringTreemap = locations.into_iter().collect();
        log::debug!("Found {} reads in {} classes of {}", uids.len(), class_ids.len(), name);

        Ok(ClassReadsIterator{
            reader, layout, options, footer: footer.clone(),
            uids: uids.iter().collect(),
            index: 0,
        })
    }

    /// Number of distinct reads this iterator returns in total.
    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    /// Decodes the next read into `block`, reusing its allocations.
    ///
    /// Returns false once all reads have been read.
    pub fn next_into(
        &mut self,
        block: &mut ReadBlock,
    ) -> Result<bool, E> {
        let uid = match self.uids.get(self.index) {
            Some(uid) => *uid,
            None => return Ok(false),
        };
        self.index += 1;
        check_uid(uid, &self.footer)?;
        self.reader.seek(uid)?;
        block.read_into(&mut self.reader, &self.layout, &self.options)?;
        Ok(true)
    }

    /// Fraction of the reads section passed so far, in [0, 1].
    pub fn progress(&self) -> f64 {
        let position = self.uids.get(self.index).copied().unwrap_or(self.footer.regions.end_reads);
        fraction(position, self.footer.regions.start_reads, self.footer.regions.end_reads)
    }
}

impl<R: Read + Seek> Iterator for ClassReadsIterator<R> {
    type Item = Result<ReadBlock, E>;

    fn next(
        &mut self,
    ) -> Option<Result<ReadBlock, E>> {
        let mut block = ReadBlock::default();
        match self.next_into(&mut block) {
            Ok(true) => Some(Ok(block)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

fn block_position(
    footer: &Footer,
    name: &str,
) -> Result<u64, E> {
    match footer.classification_offsets.get(name) {
        Some(position) => Ok(*position),
        None => Err(Box::new(UnknownClassification{ name: name.to_string() })),
    }
}

/// Reads a finished archive from a seekable handle.
pub struct ArchiveReader<R: Read + Seek> {
    reader: InputReader<R>,
    header: Header,
    footer: Footer,
    layout: RecordLayout,
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Reads and validates the header and the footer.
    ///
    /// Fails with [InvalidHeader](crate::headers::header::InvalidHeader)
    /// or [CorruptArchive](crate::headers::footer::CorruptArchive).
    pub fn new(
        conn: R,
    ) -> Result<Self, E> {
        let mut reader = InputReader::new(conn)?;
        let header = Header::read(&mut reader)?;
        let footer = Footer::read(&mut reader)?;
        let layout = RecordLayout::from_header(&header);
        log::debug!("Opened archive with {} reads", footer.number_of_reads);
        Ok(ArchiveReader{ reader, header, footer, layout })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Names of the classifications that have an index block.
    pub fn classification_names(&self) -> Vec<String> {
        self.footer.classification_offsets.keys().cloned().collect()
    }

    /// Reads the record with the given uid.
    pub fn get_read_block(
        &mut self,
        uid: u64,
        options: &ReadOptions,
    ) -> Result<ReadBlock, E> {
        check_uid(uid, &self.footer)?;
        self.reader.seek(uid)?;
        ReadBlock::read_from(&mut self.reader, &self.layout, options)
    }

    pub fn all_reads(
        &mut self,
        options: &ReadOptions,
    ) -> Result<AllReadsIterator<&mut R>, E> {
        AllReadsIterator::new(self.reader.by_ref(), self.layout, *options, &self.footer)
    }

    pub fn into_all_reads(
        self,
        options: &ReadOptions,
    ) -> Result<AllReadsIterator<R>, E> {
        AllReadsIterator::new(self.reader, self.layout, *options, &self.footer)
    }

    /// Reads assigned to any of `class_ids` in the classification `name`.
    pub fn reads_for_classes(
        &mut self,
        name: &str,
        class_ids: &[i32],
        options: &ReadOptions,
    ) -> Result<ClassReadsIterator<&mut R>, E> {
        ClassReadsIterator::new(self.reader.by_ref(), self.layout, *options, &self.footer, name, class_ids)
    }

    pub fn into_reads_for_classes(
        self,
        name: &str,
        class_ids: &[i32],
        options: &ReadOptions,
    ) -> Result<ClassReadsIterator<R>, E> {
        ClassReadsIterator::new(self.reader, self.layout, *options, &self.footer, name, class_ids)
    }

    /// Read counts and weights of every class in `name`.
    pub fn class_sizes(
        &mut self,
        name: &str,
    ) -> Result<ClassificationSummary, E> {
        let position = block_position(&self.footer, name)?;
        read_class_sizes(&mut self.reader, name, position)
    }

    /// Uids of the reads assigned to `class_id`, as stored.
    pub fn class_locations(
        &mut self,
        name: &str,
        class_id: i32,
    ) -> Result<Vec<u64>, E> {
        let position = block_position(&self.footer, name)?;
        let mut uids: Vec<u64> = Vec::new();
        read_locations(&mut self.reader, position, class_id, &mut uids)?;
        Ok(uids)
    }

    pub fn aux_data(&mut self) -> Result<IndexMap<String, Vec<u8>>, E> {
        read_aux_block(&mut self.reader, self.footer.regions.start_aux)
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Path-based access to an archive.
///
/// Keeps the header and the footer in memory and opens a new buffered
/// handle for every query.
///
/// ## Usage
///
/// ```rust
/// use rma6::BlastMode;
/// use rma6::decoder::Connector;
/// use rma6::encoder::{QueryRecord, WriterOptions, create_archive};
/// use rma6::headers::header::Header;
/// use rma6::progress::Silent;
/// use rma6::record::ReadOptions;
/// use rma6::record::matches::MatchRecord;
/// use std::fs::File;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("ERR4035126.rma6");
///
/// let header = Header::new("", BlastMode::BlastN, false, &["Taxonomy".to_string()]);
/// let records = vec![QueryRecord{
///     read_header: ">ERR4035126.1".to_string(),
///     read_sequence: Some("ACGTACGTAC".to_string()),
///     matches: vec![MatchRecord{ text: "ERR4035126.1\t0\tOZ038621.1\t1\t255\t10M\t*\t0\t0\t*\t*".to_string(), class_ids: vec![562] }],
///     mate: None,
/// }];
/// create_archive(File::create(&path).unwrap(), header, records, &mut Silent, &WriterOptions::default()).unwrap();
///
/// let connector = Connector::open(&path).unwrap();
/// assert_eq!(connector.number_of_reads(), 1);
/// assert_eq!(connector.class_ids("Taxonomy").unwrap(), vec![562]);
///
/// for read in connector.reads_for_classes("Taxonomy", &[562], &ReadOptions::default()).unwrap() {
///     assert_eq!(read.unwrap().read_name(), "ERR4035126.1");
/// }
/// ```
///
pub struct Connector {
    path: PathBuf,
    header: Header,
    footer: Footer,
}

impl Connector {
    pub fn open<P: AsRef<Path>>(
        path: P,
    ) -> Result<Self, E> {
        let path = path.as_ref().to_path_buf();
        let reader = ArchiveReader::new(BufReader::new(File::open(&path)?))?;
        let header = reader.header().clone();
        let footer = reader.footer().clone();
        Ok(Connector{ path, header, footer })
    }

    /// Opens a new reader on the archive.
    pub fn reader(&self) -> Result<ArchiveReader<BufReader<File>>, E> {
        ArchiveReader::new(BufReader::new(File::open(&self.path)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    pub fn number_of_reads(&self) -> u64 {
        self.footer.number_of_reads
    }

    pub fn number_of_matches(&self) -> u64 {
        self.footer.number_of_matches
    }

    pub fn classification_names(&self) -> Vec<String> {
        self.footer.classification_offsets.keys().cloned().collect()
    }

    pub fn class_sizes(
        &self,
        name: &str,
    ) -> Result<ClassificationSummary, E> {
        self.reader()?.class_sizes(name)
    }

    pub fn class_ids(
        &self,
        name: &str,
    ) -> Result<Vec<i32>, E> {
        Ok(self.class_sizes(name)?.class_ids())
    }

    pub fn class_size(
        &self,
        name: &str,
        class_id: i32,
    ) -> Result<u32, E> {
        Ok(self.class_sizes(name)?.class_size(class_id))
    }

    pub fn class_weight(
        &self,
        name: &str,
        class_id: i32,
    ) -> Result<i32, E> {
        Ok(self.class_sizes(name)?.class_weight(class_id))
    }

    pub fn get_read_block(
        &self,
        uid: u64,
        options: &ReadOptions,
    ) -> Result<ReadBlock, E> {
        self.reader()?.get_read_block(uid, options)
    }

    pub fn all_reads(
        &self,
        options: &ReadOptions,
    ) -> Result<AllReadsIterator<BufReader<File>>, E> {
        self.reader()?.into_all_reads(options)
    }

    pub fn reads_for_classes(
        &self,
        name: &str,
        class_ids: &[i32],
        options: &ReadOptions,
    ) -> Result<ClassReadsIterator<BufReader<File>>, E> {
        self.reader()?.into_reads_for_classes(name, class_ids, options)
    }

    pub fn aux_data(&self) -> Result<IndexMap<String, Vec<u8>>, E> {
        self.reader()?.aux_data()
    }
}
