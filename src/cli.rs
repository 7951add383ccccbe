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
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Create an .rma6 archive from matches in SAM format
    Create {
        // SAM file with the matches
        #[arg(group = "input", required = true, help = "Input SAM file")]
        sam_file: PathBuf,

        // Output file path
        #[arg(short = 'o', long = "output", required = true)]
        out_file: PathBuf,

        // Fasta or fastq file(s) with the reads
        #[arg(short = 'r', long = "reads", required = false)]
        read_files: Vec<PathBuf>,

        // Classification mapping tables as Name=file
        #[arg(short = 'm', long = "map", required = false, help = "Classification as Name=mapping.tsv")]
        mappings: Vec<String>,

        // Reads are paired, mates end in /1 and /2
        #[arg(long = "paired", default_value_t = false)]
        paired: bool,

        // Program that produced the matches
        #[arg(long = "blast-mode", default_value = "unknown")]
        blast_mode: String,

        // Store all strings uncompressed
        #[arg(long = "no-compression", default_value_t = false)]
        no_compression: bool,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Print the header, footer and class counts of an archive
    Info {
        // Input file
        #[arg(group = "input", required = true, help = "Input file")]
        input_file: PathBuf,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Print reads from an archive in fasta format
    Extract {
        // Input file
        #[arg(group = "input", required = true, help = "Input file")]
        input_file: PathBuf,

        // Only reads in these classes
        #[arg(short = 'c', long = "classification", requires = "class_ids")]
        classification: Option<String>,

        // Class ids, comma separated
        #[arg(long = "ids", value_delimiter = ',', requires = "classification")]
        class_ids: Vec<i32>,

        // Print the matches after each read
        #[arg(long = "matches", default_value_t = false)]
        matches: bool,

        // Drop matches with a lower bit score
        #[arg(long = "min-score", default_value_t = 0.0)]
        min_score: f32,

        // Drop matches with a higher expected value
        #[arg(long = "max-expected", default_value_t = f64::MAX)]
        max_expected: f64,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Rebuild the classification blocks from the stored class ids
    Reindex {
        // Input file, modified in place
        #[arg(group = "input", required = true, help = "Input file")]
        input_file: PathBuf,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // List, print or replace aux data
    Aux {
        // Input file
        #[arg(group = "input", required = true, help = "Input file")]
        input_file: PathBuf,

        // Store file contents under a label
        #[arg(long = "set", required = false, help = "Aux data as label=file")]
        set: Vec<String>,

        // Print the data stored under a label
        #[arg(long = "get", conflicts_with = "set")]
        get: Option<String>,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },
}
