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

//! Auxiliary data: labelled byte blobs stored between the classification
//! blocks and the footer.
//!
//! The block is the number of entries (i32) followed by a label (string)
//! and a blob (compressible string) per entry.
//!

use std::io::Read;
use std::io::Seek;
use std::io::Write;

use indexmap::IndexMap;

use crate::headers::footer::Footer;
use crate::io::InputReader;
use crate::io::OutputWriter;

type E = Box<dyn std::error::Error>;

pub fn write_aux_block<W: Write + Seek>(
    writer: &mut OutputWriter<W>,
    aux: &IndexMap<String, Vec<u8>>,
) -> Result<(), E> {
    writer.write_i32(aux.len() as i32)?;
    for (label, bytes) in aux.iter() {
        writer.write_string_plain(label.as_bytes())?;
        writer.write_string(bytes)?;
    }
    Ok(())
}

/// Writes the aux block at the current position and records the section
/// boundaries in `footer`.
pub fn write_aux_section<W: Write + Seek>(
    writer: &mut OutputWriter<W>,
    aux: &IndexMap<String, Vec<u8>>,
    footer: &mut Footer,
) -> Result<(), E> {
    footer.regions.start_aux = writer.position();
    write_aux_block(writer, aux)?;
    footer.regions.end_aux = writer.position();
    log::debug!("Wrote {} aux entries", aux.len());
    Ok(())
}

pub fn read_aux_block<R: Read + Seek>(
    reader: &mut InputReader<R>,
    position: u64,
) -> Result<IndexMap<String, Vec<u8>>, E> {
    reader.seek(position)?;
    let n_entries = reader.read_i32()?;
    let mut aux: IndexMap<String, Vec<u8>> = IndexMap::with_capacity((n_entries.max(0) as usize).min(1024));
    for _ in 0..n_entries {
        let label = reader.read_utf8()?;
        let bytes = reader.read_string()?;
        aux.insert(label, bytes);
    }
    Ok(aux)
}

#[cfg(test)]
mod tests {

    #[test]
    fn aux_block_keeps_label_order() {
        use super::{read_aux_block, write_aux_block};
        use crate::compression::Compression;
        use crate::io::{InputReader, OutputWriter};
        use indexmap::IndexMap;
        use std::io::Cursor;

        let mut aux: IndexMap<String, Vec<u8>> = IndexMap::new();
        aux.insert("SampleAttributes".to_string(), b"#SampleID\tColor\nERR4035126\tred\n".repeat(10));
        aux.insert("Empty".to_string(), Vec::new());
        aux.insert("Parameters".to_string(), b"minScore=50".to_vec());

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        writer.write_bytes(&[1, 2, 3]).unwrap();
        write_aux_block(&mut writer, &aux).unwrap();

        let mut reader = InputReader::new(writer.into_inner()).unwrap();
        let got = read_aux_block(&mut reader, 3).unwrap();

        assert_eq!(got, aux);
        assert_eq!(got.keys().cloned().collect::<Vec<String>>(), vec!["SampleAttributes", "Empty", "Parameters"]);
    }

    #[test]
    fn empty_aux_block() {
        use super::{read_aux_block, write_aux_block};
        use crate::compression::Compression;
        use crate::io::{InputReader, OutputWriter};
        use indexmap::IndexMap;
        use std::io::Cursor;

        let mut writer = OutputWriter::new(Cursor::new(Vec::new()), Compression::Deflate).unwrap();
        write_aux_block(&mut writer, &IndexMap::new()).unwrap();
        let mut reader = InputReader::new(writer.into_inner()).unwrap();

        assert!(read_aux_block(&mut reader, 0).unwrap().is_empty());
    }
}
