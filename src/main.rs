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
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;
use clap::Parser;

use rma6::BlastMode;
use rma6::compression::Compression;
use rma6::decoder::Connector;
use rma6::encoder::WriterOptions;
use rma6::encoder::create_archive;
use rma6::headers::header::Header;
use rma6::input::ClassMapping;
use rma6::input::query_records;
use rma6::input::read_fastx;
use rma6::input::read_sam_groups;
use rma6::modifier::Modifier;
use rma6::progress::Silent;
use rma6::record::ReadBlock;
use rma6::record::ReadOptions;

mod cli;

type E = Box<dyn std::error::Error>;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
    .module(module_path!())
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap();
}

/// Splits `Name=value` command line arguments.
fn split_assignment(
    arg: &str,
) -> Result<(&str, &str), E> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => Ok((name, value)),
        _ => Err(format!("'{}' is not of the form name=file", arg).into()),
    }
}

#[allow(clippy::too_many_arguments)]
fn create(
    sam_file: &PathBuf,
    out_file: &PathBuf,
    read_files: &[PathBuf],
    mappings: &[String],
    paired: bool,
    blast_mode: &str,
    no_compression: bool,
) -> Result<(), E> {
    let blast_mode = blast_mode.parse::<BlastMode>()?;

    let mut class_mappings: Vec<ClassMapping> = Vec::with_capacity(mappings.len());
    for arg in mappings.iter() {
        let (name, path) = split_assignment(arg)?;
        class_mappings.push(ClassMapping::read(name, BufReader::new(File::open(path)?))?);
    }

    let groups = read_sam_groups(BufReader::new(File::open(sam_file)?))?;
    let reads = if read_files.is_empty() {
        None
    } else {
        let mut reads = Vec::new();
        for file in read_files.iter() {
            reads.append(&mut read_fastx(file)?);
        }
        Some(reads)
    };
    let records = query_records(groups, reads, &class_mappings, paired);

    let names: Vec<String> = class_mappings.iter().map(|mapping| mapping.name.clone()).collect();
    let header = Header::new("", blast_mode, paired, &names);
    let options = WriterOptions{
        compression: if no_compression { Compression::None } else { Compression::Deflate },
        ..Default::default()
    };

    let conn_out = BufWriter::new(File::create(out_file)?);
    let footer = create_archive(conn_out, header, records, &mut Silent, &options)?;
    log::info!("Wrote {} reads and {} matches to {}", footer.number_of_reads, footer.number_of_matches, out_file.display());

    Ok(())
}

fn info(
    input_file: &PathBuf,
) -> Result<(), E> {
    let connector = Connector::open(input_file)?;
    let mut conn_out = BufWriter::new(std::io::stdout().lock());

    writeln!(conn_out, "{}", connector.header())?;
    writeln!(conn_out, "{}", connector.footer())?;
    for name in connector.classification_names() {
        let sizes = connector.class_sizes(&name)?;
        let assigned: u64 = sizes.sizes.values().map(|(size, _)| *size as u64).sum();
        writeln!(conn_out, "classification\t{}\t{} classes\t{} assignments", name, sizes.sizes.len(), assigned)?;
    }
    for (label, bytes) in connector.aux_data()? {
        writeln!(conn_out, "aux\t{}\t{} bytes", label, bytes.len())?;
    }
    conn_out.flush()?;

    Ok(())
}

fn write_reads<I: Iterator<Item = Result<ReadBlock, E>>, W: Write>(
    reads: I,
    with_matches: bool,
    conn_out: &mut W,
) -> Result<usize, E> {
    let mut n_reads = 0;
    for read in reads {
        let read = read?;
        if read.read_header.starts_with('>') {
            writeln!(conn_out, "{}", read.read_header)?;
        } else {
            writeln!(conn_out, ">{}", read.read_header)?;
        }
        if let Some(sequence) = &read.read_sequence {
            writeln!(conn_out, "{}", sequence)?;
        }
        if with_matches {
            for aln in read.matches.iter() {
                writeln!(conn_out, "{}", aln.text())?;
            }
        }
        n_reads += 1;
    }
    Ok(n_reads)
}

fn extract(
    input_file: &PathBuf,
    classification: &Option<String>,
    class_ids: &[i32],
    matches: bool,
    min_score: f32,
    max_expected: f64,
) -> Result<(), E> {
    let connector = Connector::open(input_file)?;
    let options = ReadOptions{ want_sequence: true, want_matches: matches, min_score, max_expected };
    let mut conn_out = BufWriter::new(std::io::stdout().lock());

    let n_reads = match classification {
        Some(name) => write_reads(connector.reads_for_classes(name, class_ids, &options)?, matches, &mut conn_out)?,
        None => write_reads(connector.all_reads(&options)?, matches, &mut conn_out)?,
    };
    conn_out.flush()?;
    log::info!("Extracted {} reads", n_reads);

    Ok(())
}

fn reindex(
    input_file: &PathBuf,
) -> Result<(), E> {
    let conn = OpenOptions::new().read(true).write(true).open(input_file)?;
    let footer = rma6::reindex(conn)?;
    log::info!("Reindexed {} classifications", footer.classification_offsets.len());
    Ok(())
}

fn aux(
    input_file: &PathBuf,
    set: &[String],
    get: &Option<String>,
) -> Result<(), E> {
    if let Some(label) = get {
        let aux = Connector::open(input_file)?.aux_data()?;
        match aux.get(label) {
            Some(bytes) => std::io::stdout().write_all(bytes)?,
            None => return Err(format!("no aux data labelled '{}'", label).into()),
        }
    } else if !set.is_empty() {
        let mut modifier = Modifier::open(input_file)?;
        let mut aux = modifier.aux_data()?;
        for arg in set.iter() {
            let (label, path) = split_assignment(arg)?;
            aux.insert(label.to_string(), std::fs::read(path)?);
        }
        modifier.save_aux_data(&aux)?;
        log::info!("Stored {} aux entries", aux.len());
    } else {
        for (label, bytes) in Connector::open(input_file)?.aux_data()? {
            println!("{}\t{}", label, bytes.len());
        }
    }
    Ok(())
}

fn main() {
    let cli = cli::Cli::parse();

    // Subcommands:
    let res: Result<(), E> = match &cli.command {
        // Create
        Some(cli::Commands::Create {
            sam_file,
            out_file,
            read_files,
            mappings,
            paired,
            blast_mode,
            no_compression,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            create(sam_file, out_file, read_files, mappings, *paired, blast_mode, *no_compression)
        },

        // Info
        Some(cli::Commands::Info {
            input_file,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            info(input_file)
        },

        // Extract
        Some(cli::Commands::Extract {
            input_file,
            classification,
            class_ids,
            matches,
            min_score,
            max_expected,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            extract(input_file, classification, class_ids, *matches, *min_score, *max_expected)
        },

        // Reindex
        Some(cli::Commands::Reindex {
            input_file,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            reindex(input_file)
        },

        // Aux
        Some(cli::Commands::Aux {
            input_file,
            set,
            get,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            aux(input_file, set, get)
        },

        None => cli::Cli::command().print_help().map_err(|e| e.into()),
    };

    if let Err(e) = res {
        eprintln!("rma6: {}", e);
        std::process::exit(1);
    }
}
