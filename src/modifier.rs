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

//! Replacing the classification and aux sections of a finished archive.
//!
//! Both operations truncate the archive at the start of the section they
//! replace and write everything after it again, the header and the reads
//! are never touched.
//!
//! The archive is modified in place. If the process stops between the
//! truncation and the end of the new footer the archive can no longer be
//! opened.
//!

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;

use crate::auxdata::read_aux_block;
use crate::auxdata::write_aux_section;
use crate::classification::ClassificationIndex;
use crate::classification::check_unique_names;
use crate::classification::write_classification_section;
use crate::compression::Compression;
use crate::headers::footer::Footer;
use crate::headers::header::Header;
use crate::io::InputReader;
use crate::io::OutputWriter;
use crate::io::SetLen;
use crate::record::RecordError;

type E = Box<dyn std::error::Error>;

pub struct Modifier<F: Read + Write + Seek + SetLen> {
    conn: F,
    header: Header,
    footer: Footer,
    compression: Compression,
}

impl Modifier<File> {
    /// Opens the archive at `path` for reading and writing.
    pub fn open<P: AsRef<Path>>(
        path: P,
    ) -> Result<Self, E> {
        let conn = OpenOptions::new().read(true).write(true).open(path)?;
        Modifier::new(conn)
    }
}

impl<F: Read + Write + Seek + SetLen> Modifier<F> {
    /// Reads and validates the header and the footer of `conn`.
    pub fn new(
        mut conn: F,
    ) -> Result<Self, E> {
        let (header, footer) = {
            let mut reader = InputReader::new(&mut conn)?;
            let header = Header::read(&mut reader)?;
            let footer = Footer::read(&mut reader)?;
            (header, footer)
        };
        Ok(Modifier{ conn, header, footer, compression: Compression::default() })
    }

    /// Sets the compression of the aux data written from now on.
    pub fn with_compression(
        mut self,
        compression: Compression,
    ) -> Self {
        self.compression = compression;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    /// Replaces every classification block with the blocks of `indices`.
    ///
    /// The aux data is replaced by an empty aux block. The counts of reads
    /// and matches in the footer are kept.
    ///
    /// The archive is left untouched if two indices have the same name or
    /// an index refers to an offset outside the reads section.
    pub fn update_classifications(
        &mut self,
        indices: &[ClassificationIndex],
    ) -> Result<Footer, E> {
        check_unique_names(indices.iter().map(|index| index.name.as_str()))?;
        let (start_reads, end_reads) = (self.footer.regions.start_reads, self.footer.regions.end_reads);
        for index in indices.iter() {
            let outside = index.locations.values().flatten().find(|uid| **uid < start_reads || **uid >= end_reads);
            if let Some(uid) = outside {
                return Err(Box::new(RecordError{ message: format!("classification '{}' refers to uid {} outside the reads section", index.name, uid) }))
            }
        }

        let mut footer = self.footer.clone();
        let mut writer = OutputWriter::new(&mut self.conn, self.compression)?;
        writer.truncate(footer.regions.start_classifications)?;

        write_classification_section(&mut writer, indices, &mut footer)?;
        write_aux_section(&mut writer, &IndexMap::new(), &mut footer)?;
        footer.write(&mut writer)?;
        writer.flush()?;

        log::info!("Rewrote {} classification blocks", indices.len());
        self.footer = footer;
        Ok(self.footer.clone())
    }

    /// Replaces the aux data, keeping the classification blocks.
    pub fn save_aux_data(
        &mut self,
        aux: &IndexMap<String, Vec<u8>>,
    ) -> Result<Footer, E> {
        let mut footer = self.footer.clone();
        let mut writer = OutputWriter::new(&mut self.conn, self.compression)?;
        writer.truncate(footer.regions.start_aux)?;

        write_aux_section(&mut writer, aux, &mut footer)?;
        footer.write(&mut writer)?;
        writer.flush()?;

        log::info!("Saved {} aux entries", aux.len());
        self.footer = footer;
        Ok(self.footer.clone())
    }

    /// Reads the current aux data.
    pub fn aux_data(&mut self) -> Result<IndexMap<String, Vec<u8>>, E> {
        let mut reader = InputReader::new(&mut self.conn)?;
        read_aux_block(&mut reader, self.footer.regions.start_aux)
    }

    pub fn into_inner(self) -> F {
        self.conn
    }
}
