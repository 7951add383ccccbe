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

//! Writing an archive section by section.
//!
//! [ArchiveWriter] enforces the order in which the sections are written:
//!
//!   1. [write_header](ArchiveWriter::write_header)
//!   2. [start_adding_queries](ArchiveWriter::start_adding_queries)
//!   3. [add_query](ArchiveWriter::add_query), any number of times
//!   4. [end_adding_queries](ArchiveWriter::end_adding_queries)
//!   5. [write_classifications](ArchiveWriter::write_classifications)
//!   6. [write_aux_blocks](ArchiveWriter::write_aux_blocks)
//!   7. [close](ArchiveWriter::close)
//!
//! A call made out of order fails with [CreatorStateError] without writing
//! anything. [close](ArchiveWriter::close) can be called from any state
//! after the header has been written and fills in the missing sections
//! as empty, so an interrupted write still produces a valid archive.
//!

use std::io::Seek;
use std::io::Write;

use indexmap::IndexMap;
use roaring::RoaringTreemap;

use crate::auxdata::write_aux_section;
use crate::classification::ClassificationIndex;
use crate::classification::check_unique_names;
use crate::classification::write_classification_section;
use crate::compression::Compression;
use crate::headers::footer::Footer;
use crate::headers::header::Header;
use crate::io::OutputWriter;
use crate::progress::Cancelled;
use crate::progress::ProgressListener;
use crate::record::RecordError;
use crate::record::RecordLayout;
use crate::record::matches::MatchRecord;
use crate::record::write_read_record;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Created,
    HeaderWritten,
    AddingQueries,
    QueriesFinished,
    ClassificationsWritten,
    AuxWritten,
    Closed,
}

impl std::fmt::Display for WriterState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            WriterState::Created => "created",
            WriterState::HeaderWritten => "header written",
            WriterState::AddingQueries => "adding queries",
            WriterState::QueriesFinished => "queries finished",
            WriterState::ClassificationsWritten => "classifications written",
            WriterState::AuxWritten => "aux data written",
            WriterState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct CreatorStateError {
    pub expected: WriterState,
    pub found: WriterState,
}

impl std::fmt::Display for CreatorStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "archive writer is {} but must be {}", self.found, self.expected)
    }
}

impl std::error::Error for CreatorStateError {}

/// Settings for writing new archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub compression: Compression,
    /// Stored in the header if the header does not name a creator.
    pub creator: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions{
            compression: Compression::default(),
            creator: format!("rma6 v{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Writes an archive to a seekable handle.
///
/// The uid returned by [add_query](ArchiveWriter::add_query) is the offset
/// of the record in the handle, so the handle should be empty when the
/// writer is created.
pub struct ArchiveWriter<W: Write + Seek> {
    writer: OutputWriter<W>,
    header: Header,
    layout: RecordLayout,
    footer: Footer,
    state: WriterState,

    // Uids of the records written so far
    uids: RoaringTreemap,
    // (earlier record, later record) pairs whose earlier record still
    // points at no mate
    pending_mates: Vec<(u64, u64)>,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Fails before anything is written if the header names a
    /// classification twice.
    pub fn new(
        conn: W,
        mut header: Header,
        options: &WriterOptions,
    ) -> Result<Self, E> {
        check_unique_names(header.classification_names.iter().map(|name| name.as_str()))?;
        if header.creator.is_empty() {
            header.creator = options.creator.clone();
        }
        let layout = RecordLayout::from_header(&header);
        Ok(ArchiveWriter{
            writer: OutputWriter::new(conn, options.compression)?,
            header, layout,
            footer: Footer::default(),
            state: WriterState::Created,
            uids: RoaringTreemap::new(),
            pending_mates: Vec::new(),
        })
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn number_of_reads(&self) -> u64 {
        self.footer.number_of_reads
    }

    pub fn number_of_matches(&self) -> u64 {
        self.footer.number_of_matches
    }

    /// Current offset in the handle.
    pub fn position(&self) -> u64 {
        self.writer.position()
    }

    fn expect_state(
        &self,
        expected: WriterState,
    ) -> Result<(), E> {
        if self.state != expected {
            return Err(Box::new(CreatorStateError{ expected, found: self.state }))
        }
        Ok(())
    }

    pub fn write_header(&mut self) -> Result<(), E> {
        self.expect_state(WriterState::Created)?;
        self.footer.regions.start_header = self.writer.position();
        self.header.write(&mut self.writer)?;
        self.footer.regions.end_header = self.writer.position();
        self.state = WriterState::HeaderWritten;
        log::debug!("Wrote header of {} bytes", self.footer.regions.end_header - self.footer.regions.start_header);
        Ok(())
    }

    pub fn start_adding_queries(&mut self) -> Result<(), E> {
        self.expect_state(WriterState::HeaderWritten)?;
        self.footer.regions.start_reads = self.writer.position();
        self.state = WriterState::AddingQueries;
        Ok(())
    }

    /// Writes a read record and returns its uid.
    ///
    /// `mate_uid` must be the uid of a record written earlier by this
    /// writer. The earlier record is updated to point back at this one by
    /// [end_adding_queries](ArchiveWriter::end_adding_queries).
    pub fn add_query(
        &mut self,
        read_header: &str,
        read_sequence: Option<&str>,
        matches: &[MatchRecord],
        mate_uid: Option<u64>,
    ) -> Result<u64, E> {
        self.expect_state(WriterState::AddingQueries)?;
        if let Some(mate) = mate_uid {
            if !self.uids.contains(mate) {
                return Err(Box::new(RecordError{ message: format!("mate of '{}' refers to unknown uid {}", read_header, mate) }))
            }
        }

        let uid = write_read_record(&mut self.writer, &self.layout, mate_uid, read_header, read_sequence, matches)?;
        self.uids.insert(uid);
        if let Some(mate) = mate_uid {
            self.pending_mates.push((mate, uid));
        }

        self.footer.number_of_reads += 1;
        self.footer.number_of_matches += matches.len() as u64;
        Ok(uid)
    }

    /// Closes the reads section and links every pair of mates.
    pub fn end_adding_queries(&mut self) -> Result<(), E> {
        self.expect_state(WriterState::AddingQueries)?;
        self.footer.regions.end_reads = self.writer.position();

        for (earlier, later) in self.pending_mates.iter() {
            self.writer.patch_i64(*earlier, *later as i64)?;
        }
        log::debug!("Linked {} pairs of mates", self.pending_mates.len());
        self.pending_mates.clear();

        self.state = WriterState::QueriesFinished;
        log::info!("Wrote {} reads with {} matches", self.footer.number_of_reads, self.footer.number_of_matches);
        Ok(())
    }

    /// Writes one index block per classification.
    ///
    /// Every uid in `indices` must have been returned by
    /// [add_query](ArchiveWriter::add_query).
    pub fn write_classifications(
        &mut self,
        indices: &[ClassificationIndex],
    ) -> Result<(), E> {
        self.expect_state(WriterState::QueriesFinished)?;
        for index in indices.iter() {
            let unknown = index.locations.values().flatten().find(|uid| !self.uids.contains(**uid));
            if let Some(uid) = unknown {
                return Err(Box::new(RecordError{ message: format!("classification '{}' refers to unknown uid {}", index.name, uid) }))
            }
        }
        write_classification_section(&mut self.writer, indices, &mut self.footer)?;
        self.state = WriterState::ClassificationsWritten;
        Ok(())
    }

    pub fn write_aux_blocks(
        &mut self,
        aux: &IndexMap<String, Vec<u8>>,
    ) -> Result<(), E> {
        self.expect_state(WriterState::ClassificationsWritten)?;
        write_aux_section(&mut self.writer, aux, &mut self.footer)?;
        self.state = WriterState::AuxWritten;
        Ok(())
    }

    /// Writes the footer and flushes the handle.
    ///
    /// Sections that have not been written yet are written empty first, so
    /// this can be used to finish an archive whose writing was interrupted.
    /// Fails if the header has not been written or the writer is already
    /// closed.
    pub fn close(&mut self) -> Result<Footer, E> {
        loop {
            match self.state {
                WriterState::HeaderWritten => self.start_adding_queries()?,
                WriterState::AddingQueries => self.end_adding_queries()?,
                WriterState::QueriesFinished => self.write_classifications(&[])?,
                WriterState::ClassificationsWritten => self.write_aux_blocks(&IndexMap::new())?,
                WriterState::AuxWritten => break,
                found => return Err(Box::new(CreatorStateError{ expected: WriterState::AuxWritten, found })),
            }
        }

        self.footer.write(&mut self.writer)?;
        self.writer.flush()?;
        self.state = WriterState::Closed;
        log::info!("Closed archive of {} bytes", self.footer.end_footer);
        Ok(self.footer.clone())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// A read as input to [create_archive].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryRecord {
    pub read_header: String,
    pub read_sequence: Option<String>,
    pub matches: Vec<MatchRecord>,
    /// Index of the mate among the records given before this one.
    pub mate: Option<usize>,
}

fn add_records<W: Write + Seek, I: Iterator<Item = QueryRecord>, P: ProgressListener>(
    writer: &mut ArchiveWriter<W>,
    records: I,
    indices: &mut [ClassificationIndex],
    progress: &mut P,
) -> Result<(), E> {
    let mut uids: Vec<u64> = Vec::new();
    let width = writer.layout().n_classifications;

    for record in records {
        if progress.is_cancelled() {
            return Err(Box::new(Cancelled))
        }

        let mate_uid = match record.mate {
            Some(idx) => match uids.get(idx) {
                Some(uid) => Some(*uid),
                None => return Err(Box::new(RecordError{ message: format!("mate of '{}' is record {} which has not been written", record.read_header, idx) })),
            },
            None => None,
        };
        let uid = writer.add_query(&record.read_header, record.read_sequence.as_deref(), &record.matches, mate_uid)?;
        uids.push(uid);

        for (column, index) in indices.iter_mut().enumerate().take(width) {
            index.add_read(uid, record.matches.iter().filter_map(|m| m.class_ids.get(column).copied()));
        }
        progress.set_progress(uids.len() as u64);
    }

    Ok(())
}

/// Create an archive from an iterator over reads.
///
/// Builds one classification index per classification named in `header`
/// from the class ids of the matches: a read is assigned to every distinct
/// non-zero id its matches carry.
///
/// `progress` is polled between reads. If it reports cancellation, or a
/// read cannot be written, the archive is still finalized with the reads
/// written so far before the error is returned. Cancellation returns
/// [Cancelled].
///
/// ## Usage
///
/// ```rust
/// use rma6::BlastMode;
/// use rma6::decoder::ArchiveReader;
/// use rma6::encoder::{QueryRecord, WriterOptions, create_archive};
/// use rma6::headers::header::Header;
/// use rma6::progress::Silent;
/// use rma6::record::ReadOptions;
/// use rma6::record::matches::MatchRecord;
/// use std::io::Cursor;
///
/// let header = Header::new("", BlastMode::BlastN, true, &["Taxonomy".to_string()]);
/// let records = vec![
///     QueryRecord{
///         read_header: ">ERR4035126.1/1".to_string(),
///         read_sequence: Some("ACGTACGTAC".to_string()),
///         matches: vec![MatchRecord{ text: "ERR4035126.1\t0\tOZ038621.1\t1\t255\t10M\t*\t0\t0\t*\t*\tAS:i:20".to_string(), class_ids: vec![562] }],
///         mate: None,
///     },
///     QueryRecord{
///         read_header: ">ERR4035126.1/2".to_string(),
///         read_sequence: Some("TTTTGGGGCC".to_string()),
///         matches: Vec::new(),
///         mate: Some(0),
///     },
/// ];
///
/// let mut archive: Cursor<Vec<u8>> = Cursor::new(Vec::new());
/// let footer = create_archive(&mut archive, header, records, &mut Silent, &WriterOptions::default()).unwrap();
/// assert_eq!(footer.number_of_reads, 2);
/// assert_eq!(footer.number_of_matches, 1);
///
/// let mut reader = ArchiveReader::new(&mut archive).unwrap();
/// let reads = reader.all_reads(&ReadOptions::default()).unwrap().collect::<Result<Vec<_>, _>>().unwrap();
/// assert_eq!(reads[1].mate_uid, Some(reads[0].uid));
/// assert_eq!(reader.class_locations("Taxonomy", 562).unwrap(), vec![reads[0].uid]);
/// ```
///
pub fn create_archive<W: Write + Seek, I: IntoIterator<Item = QueryRecord>, P: ProgressListener>(
    conn: W,
    header: Header,
    records: I,
    progress: &mut P,
    options: &WriterOptions,
) -> Result<Footer, E> {
    let mut writer = ArchiveWriter::new(conn, header, options)?;
    writer.write_header()?;
    writer.start_adding_queries()?;

    let records = records.into_iter();
    if let Some(n) = records.size_hint().1 {
        progress.set_maximum(n as u64);
    }

    let mut indices: Vec<ClassificationIndex> = writer.header().classification_names.iter().map(|name| ClassificationIndex::new(name)).collect();
    let added = add_records(&mut writer, records, &mut indices, progress);

    // The indices only refer to reads that were written, so they are kept
    // also when adding stopped early.
    let finished = writer.end_adding_queries()
        .and_then(|_| writer.write_classifications(&indices))
        .and_then(|_| writer.write_aux_blocks(&IndexMap::new()))
        .and_then(|_| writer.close());

    match (added, finished) {
        (Ok(_), finished) => finished,
        (Err(e), Ok(footer)) => {
            log::warn!("Finalized archive with {} reads after: {}", footer.number_of_reads, e);
            Err(e)
        },
        (Err(e), Err(close_err)) => {
            log::error!("Could not finalize archive: {}", close_err);
            Err(e)
        },
    }
}

// Tests
#[cfg(test)]
mod tests {
    use crate::record::matches::MatchRecord;

    fn mock_header() -> crate::headers::header::Header {
        use crate::BlastMode;
        use crate::headers::header::Header;

        let mut header = Header::new("test", BlastMode::BlastN, true, &["Taxonomy".to_string(), "EC".to_string()]);
        header.creation_date = Some(1);
        header
    }

    fn mock_match(taxon: i32, ec: i32) -> MatchRecord {
        MatchRecord{
            text: format!("q\t0\tref_{}\t1\t255\t12M\t*\t0\t0\t*\t*\tAS:i:30", taxon),
            class_ids: vec![taxon, ec],
        }
    }

    #[test]
    fn calls_out_of_order_fail() {
        use super::{ArchiveWriter, CreatorStateError, WriterOptions, WriterState};
        use std::io::Cursor;

        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), mock_header(), &WriterOptions::default()).unwrap();

        let got = writer.add_query(">r1", None, &[], None).unwrap_err();
        let got = got.downcast_ref::<CreatorStateError>().unwrap();
        assert_eq!(got.expected, WriterState::AddingQueries);
        assert_eq!(got.found, WriterState::Created);
        assert_eq!(writer.position(), 0);

        assert!(writer.close().is_err());
        writer.write_header().unwrap();
        assert!(writer.write_header().is_err());
        assert!(writer.end_adding_queries().is_err());
        assert_eq!(writer.state(), WriterState::HeaderWritten);
    }

    #[test]
    fn unknown_mate_is_rejected() {
        use super::{ArchiveWriter, WriterOptions};
        use crate::record::RecordError;
        use std::io::Cursor;

        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), mock_header(), &WriterOptions::default()).unwrap();
        writer.write_header().unwrap();
        writer.start_adding_queries().unwrap();
        let uid = writer.add_query(">r1", None, &[], None).unwrap();

        let got = writer.add_query(">r2", None, &[], Some(uid + 1)).unwrap_err();
        assert!(got.downcast_ref::<RecordError>().is_some());
        assert_eq!(writer.number_of_reads(), 1);
    }

    #[test]
    fn classification_with_unknown_uid_is_rejected() {
        use super::{ArchiveWriter, WriterOptions, WriterState};
        use crate::classification::ClassificationIndex;
        use std::io::Cursor;

        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), mock_header(), &WriterOptions::default()).unwrap();
        writer.write_header().unwrap();
        writer.start_adding_queries().unwrap();
        let uid = writer.add_query(">r1", None, &[mock_match(5, 0)], None).unwrap();
        writer.end_adding_queries().unwrap();

        let mut index = ClassificationIndex::new("Taxonomy");
        index.add(5, uid);
        index.add(5, uid + 3);
        assert!(writer.write_classifications(&[index]).is_err());
        assert_eq!(writer.state(), WriterState::QueriesFinished);
    }

    #[test]
    fn close_fills_in_missing_sections() {
        use super::{ArchiveWriter, WriterOptions, WriterState};
        use crate::decoder::ArchiveReader;
        use std::io::Cursor;

        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), mock_header(), &WriterOptions::default()).unwrap();
        writer.write_header().unwrap();
        writer.start_adding_queries().unwrap();
        let first = writer.add_query(">r1", Some("ACGT"), &[mock_match(5, 1)], None).unwrap();
        let second = writer.add_query(">r2", Some("ACGT"), &[], Some(first)).unwrap();

        let footer = writer.close().unwrap();
        assert_eq!(writer.state(), WriterState::Closed);
        assert!(writer.close().is_err());
        assert_eq!(footer.number_of_reads, 2);
        assert!(footer.classification_offsets.is_empty());
        assert_eq!(footer.regions.end_reads, footer.regions.start_classifications);

        let mut reader = ArchiveReader::new(writer.into_inner()).unwrap();
        assert_eq!(reader.get_read_block(first, &Default::default()).unwrap().mate_uid, Some(second));
        assert!(reader.aux_data().unwrap().is_empty());
    }

    #[test]
    fn creator_defaults_to_options() {
        use super::{ArchiveWriter, WriterOptions};
        use crate::BlastMode;
        use crate::headers::header::Header;
        use std::io::Cursor;

        let header = Header::new("", BlastMode::BlastX, false, &[]);
        let options = WriterOptions{ creator: "MEGAN".to_string(), ..Default::default() };
        let writer = ArchiveWriter::new(Cursor::new(Vec::new()), header, &options).unwrap();
        assert_eq!(writer.header().creator, "MEGAN");
    }

    #[test]
    fn duplicate_header_names_are_rejected() {
        use super::{ArchiveWriter, QueryRecord, WriterOptions, create_archive};
        use crate::BlastMode;
        use crate::classification::DuplicateClassification;
        use crate::headers::header::Header;
        use crate::progress::Silent;
        use std::io::Cursor;

        let names = vec!["Taxonomy".to_string(), "Taxonomy".to_string()];
        let header = Header::new("test", BlastMode::BlastN, false, &names);
        let got = ArchiveWriter::new(Cursor::new(Vec::new()), header.clone(), &WriterOptions::default());
        assert!(got.err().unwrap().downcast_ref::<DuplicateClassification>().is_some());

        let mut archive: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        let records = vec![QueryRecord{ read_header: ">r1".to_string(), read_sequence: Some("ACGT".to_string()), matches: vec![], mate: None }];
        assert!(create_archive(&mut archive, header, records, &mut Silent, &WriterOptions::default()).is_err());
        assert!(archive.get_ref().is_empty());
    }

    #[test]
    fn create_archive_builds_indices() {
        use super::{QueryRecord, WriterOptions, create_archive};
        use crate::decoder::ArchiveReader;
        use crate::progress::Silent;
        use std::io::Cursor;

        let records = vec![
            QueryRecord{ read_header: ">r1".to_string(), read_sequence: None, matches: vec![mock_match(5, 1), mock_match(7, 1)], mate: None },
            QueryRecord{ read_header: ">r2".to_string(), read_sequence: None, matches: vec![], mate: Some(0) },
            QueryRecord{ read_header: ">r3".to_string(), read_sequence: None, matches: vec![mock_match(5, 0)], mate: None },
        ];

        let mut archive: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        let footer = create_archive(&mut archive, mock_header(), records, &mut Silent, &WriterOptions::default()).unwrap();
        assert_eq!(footer.number_of_matches, 3);

        let mut reader = ArchiveReader::new(&mut archive).unwrap();
        let uids: Vec<u64> = reader.all_reads(&Default::default()).unwrap().map(|x| x.unwrap().uid).collect();
        assert_eq!(reader.class_locations("Taxonomy", 5).unwrap(), vec![uids[0], uids[2]]);
        assert_eq!(reader.class_locations("Taxonomy", 7).unwrap(), vec![uids[0]]);
        assert_eq!(reader.class_locations("EC", 1).unwrap(), vec![uids[0]]);
        assert_eq!(reader.class_sizes("EC").unwrap().class_ids(), vec![1]);
    }

    #[test]
    fn cancelled_archive_is_still_finalized() {
        use super::{QueryRecord, WriterOptions, create_archive};
        use crate::decoder::ArchiveReader;
        use crate::progress::{CancelFlag, Cancelled};
        use std::io::Cursor;

        let records: Vec<QueryRecord> = (0..10).map(|i| {
            QueryRecord{ read_header: format!(">r{}", i), read_sequence: Some("ACGT".to_string()), matches: vec![mock_match(i + 1, 0)], mate: None }
        }).collect();

        let mut flag = CancelFlag::after_updates(4);
        let mut archive: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        let got = create_archive(&mut archive, mock_header(), records, &mut flag, &WriterOptions::default());
        assert!(got.unwrap_err().downcast_ref::<Cancelled>().is_some());
        assert_eq!(flag.maximum, 10);

        let mut reader = ArchiveReader::new(&mut archive).unwrap();
        assert_eq!(reader.footer().number_of_reads, 4);
        assert_eq!(reader.all_reads(&Default::default()).unwrap().count(), 4);
        assert_eq!(reader.class_sizes("Taxonomy").unwrap().class_ids(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn cancel_handle_stops_running_archive() {
        use super::{QueryRecord, WriterOptions, create_archive};
        use crate::decoder::ArchiveReader;
        use crate::progress::{CancelFlag, Cancelled};
        use std::io::Cursor;

        let mut flag = CancelFlag::new();
        let handle = flag.handle();
        let records = (0..10).map(move |i| {
            if i == 3 {
                handle.cancel();
            }
            QueryRecord{ read_header: format!(">r{}", i), read_sequence: Some("ACGT".to_string()), matches: vec![mock_match(i + 1, 0)], mate: None }
        });

        let mut archive: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        let got = create_archive(&mut archive, mock_header(), records, &mut flag, &WriterOptions::default());
        assert!(got.err().unwrap().downcast_ref::<Cancelled>().is_some());

        let reader = ArchiveReader::new(&mut archive).unwrap();
        assert_eq!(reader.footer().number_of_reads, 3);
        assert_eq!(flag.progress, 3);
    }

    #[test]
    fn failed_record_still_finalizes() {
        use super::{QueryRecord, WriterOptions, create_archive};
        use crate::decoder::ArchiveReader;
        use crate::progress::Silent;
        use crate::record::RecordError;
        use std::io::Cursor;

        let records = vec![
            QueryRecord{ read_header: ">r1".to_string(), read_sequence: None, matches: vec![mock_match(5, 1)], mate: None },
            QueryRecord{ read_header: ">r2".to_string(), read_sequence: None, matches: vec![], mate: Some(4) },
        ];

        let mut archive: Cursor<Vec<u8>> = Cursor::new(Vec::new());
        let got = create_archive(&mut archive, mock_header(), records, &mut Silent, &WriterOptions::default());
        assert!(got.unwrap_err().downcast_ref::<RecordError>().is_some());

        let reader = ArchiveReader::new(&mut archive).unwrap();
        assert_eq!(reader.footer().number_of_reads, 1);
    }
}
