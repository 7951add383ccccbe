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

//! Header and footer sections of the encoded format.
//!
//! ## Header
//!
//! The [Header](header::Header) is the first section of every archive and
//! is written exactly once. It contains:
//!
//! - A 12 byte preamble: magic number, version and minor version.
//! - Name of the program that created the archive.
//! - Creation date (milliseconds since the epoch).
//! - The [BlastMode](crate::BlastMode) the alignments were produced with.
//! - Whether the reads are paired.
//! - Names of the classifications whose class ids are stored with every match.
//!
//! Opening an archive fails if the magic number or version do not match.
//!
//! ## Footer
//!
//! The [Footer](footer::Footer) is the last section and is written when an
//! archive is finished. It contains:
//!
//! - Number of reads and number of matches.
//! - Start offset of each classification block.
//! - Start and end offsets of the header, reads, classification and
//!   auxiliary data sections.
//! - Start and end offset of the footer itself.
//!
//! The last 16 bytes of an archive are always the start and end of the
//! footer, so the footer is found by seeking to `length - 16`. An end
//! offset that does not match the file length marks a corrupt archive.
//!

pub mod footer;
pub mod header;

/// Big-endian fixed-width integers, matching the rest of the format.
pub(crate) fn fixed_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}
