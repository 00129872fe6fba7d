use log::{debug, info, warn};

use anno_align::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use text_diff::print_diff;

use crate::pipeline::config_reader::*;
use crate::pipeline::io_csv::RawFile;

pub mod config_reader;
pub mod io_csv;
pub mod io_export;

#[derive(Debug, Snafu)]
pub enum RunError {
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing a CSV line in {path}"))]
    CsvLineParse { source: csv::Error, path: String },
    #[snafu(display("Error writing CSV output {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error reading {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Unexpected JSON shape in {path}: {detail}"))]
    JsonShape { path: String, detail: String },
    #[snafu(display("Error listing directory {path}"))]
    ListingDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("In {path}: {source}"))]
    Alignment { source: AlignErrors, path: String },
    #[snafu(display("{source}"))]
    Integrity { source: AlignErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RunResult<T> = Result<T, RunError>;

/// Runs one alignment pass: mapping file to shuffle map, raw exports to
/// normalized facts, facts to the flat record table.
pub fn run_alignment(
    config_path: &str,
    out_override: Option<String>,
    reference_path: Option<String>,
) -> RunResult<()> {
    let config = read_config(config_path)?;
    info!("config: {:?}", config);

    let scheme = config.scheme()?;
    let rules = config.chunking_rules();
    let systems = config.system_set()?;
    let marker = config.marker(scheme);

    // Paths in the configuration are relative to the configuration file.
    let root = Path::new(config_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mapping_path = join_path(&root, &config.mapping_file);
    let mapping_rows = io_csv::read_rows(&mapping_path)?;
    let map = ShuffleMap::build(&mapping_rows).context(AlignmentSnafu {
        path: mapping_path.clone(),
    })?;
    // Surface mapping gaps before any export is decoded: a hole found during
    // resolution would be attributed to the wrong file otherwise.
    map.check_complete(systems.len() as u8)
        .context(AlignmentSnafu { path: mapping_path })?;
    info!("shuffle map: {} documents", map.len());

    let dir = join_path(&root, &config.annotation_directory);
    let files = io_csv::list_annotation_files(&dir, &marker)?;
    if files.is_empty() {
        whatever!("No annotation files carrying marker {:?} under {}", marker, dir);
    }
    info!("{} annotation files under {}", files.len(), dir);

    let out_path = match out_override {
        Some(p) => p,
        None => join_path(&root, &config.output_path),
    };

    match scheme {
        Scheme::Likert => run_likert(&config, &map, &systems, &rules, &files, &root, &out_path)?,
        Scheme::Bws => run_bws(&config, &map, &systems, &rules, &files, &root, &out_path)?,
    }

    if let Some(reference) = reference_path {
        check_reference(&out_path, &reference)?;
    }
    Ok(())
}

fn run_likert(
    config: &AlignmentConfig,
    map: &ShuffleMap,
    systems: &SystemSet,
    rules: &ChunkingRules,
    files: &[RawFile],
    root: &Path,
    out_path: &str,
) -> RunResult<()> {
    let mut answers: Vec<RawAnswer> = Vec::new();
    let mut excluded: BTreeSet<u32> = BTreeSet::new();
    let mut incomplete_files: BTreeSet<String> = BTreeSet::new();
    for file in files {
        let rows = io_csv::read_rows(&file.path)?;
        let decode = decode_likert(&rows, file.start_offset, systems.len() as u8).context(
            AlignmentSnafu {
                path: file.path.clone(),
            },
        )?;
        debug!("{}: {} answers", file.file_name, decode.answers.len());
        if !decode.missing_documents.is_empty() {
            incomplete_files.insert(file.file_name.clone());
            excluded.extend(decode.missing_documents.iter().copied());
        }
        answers.extend(decode.answers);
    }

    let facts = resolve_likert(map, systems, &answers).context(IntegritySnafu {})?;
    validate_likert(&facts, systems, rules, &excluded).context(IntegritySnafu {})?;
    let records =
        likert_records(&facts, systems, rules, &config.corpus_name, &excluded)
            .context(IntegritySnafu {})?;
    info!("writing {} records to {}", records.len(), out_path);
    io_export::write_likert_csv(out_path, &records)?;

    if let Some(facts_path) = &config.facts_path {
        io_export::write_likert_facts(&join_path(root, facts_path), &facts)?;
    }

    report_missing(&incomplete_files, &excluded);
    Ok(())
}

fn run_bws(
    config: &AlignmentConfig,
    map: &ShuffleMap,
    systems: &SystemSet,
    rules: &ChunkingRules,
    files: &[RawFile],
    root: &Path,
    out_path: &str,
) -> RunResult<()> {
    let mut answers: Vec<RawAnswer> = Vec::new();
    for file in files {
        let rows = io_csv::read_rows(&file.path)?;
        let decoded = decode_bws(&rows, file.start_offset).context(AlignmentSnafu {
            path: file.path.clone(),
        })?;
        debug!("{}: {} answers", file.file_name, decoded.len());
        answers.extend(decoded);
    }

    let mut facts = resolve_bws(map, systems, &answers).context(IntegritySnafu {})?;
    let repaired = validate_bws(&mut facts, rules).context(IntegritySnafu {})?;
    for (document, role) in repaired.iter() {
        info!(
            "repaired double-counted {} pick for document {}",
            role.label(),
            document
        );
    }
    let records =
        bws_records(&facts, systems, rules, &config.corpus_name).context(IntegritySnafu {})?;
    info!("writing {} records to {}", records.len(), out_path);
    io_export::write_bws_csv(out_path, &records)?;

    if let Some(facts_path) = &config.facts_path {
        io_export::write_bws_facts(&join_path(root, facts_path), &facts)?;
    }
    Ok(())
}

/// The diagnostics report for tolerated Likert gaps. Always emitted when any
/// annotation was missing, so the exclusions never go unnoticed.
fn report_missing(files: &BTreeSet<String>, documents: &BTreeSet<u32>) {
    if files.is_empty() {
        return;
    }
    warn!(
        "missing annotations in files {:?}; documents {:?} excluded from the output",
        files, documents
    );
}

/// Compares two annotation passes joined by worker identity and writes the
/// per-worker metrics.
pub fn run_consistency(
    original_path: &str,
    redo_path: &str,
    scheme_name: &str,
    metrics_out: Option<String>,
) -> RunResult<()> {
    let scheme = parse_scheme(scheme_name)?;
    let report = match scheme {
        Scheme::Likert => {
            let original = io_export::read_likert_facts(original_path)?;
            let redo = io_export::read_likert_facts(redo_path)?;
            compare_likert(&original, &redo).context(IntegritySnafu {})?
        }
        Scheme::Bws => {
            let original = io_export::read_bws_facts(original_path)?;
            let redo = io_export::read_bws_facts(redo_path)?;
            compare_bws(&original, &redo).context(IntegritySnafu {})?
        }
    };
    info!("consistency over {} workers", report.per_worker.len());
    for (worker, metric) in report.per_worker.iter() {
        debug!("worker {}: {}", worker, metric);
    }
    println!(
        "{}: mean per-worker consistency metric: {}",
        scheme_name, report.mean
    );
    if let Some(path) = metrics_out {
        io_export::write_metrics(&path, &report)?;
    }
    Ok(())
}

fn check_reference(out_path: &str, reference_path: &str) -> RunResult<()> {
    let produced = fs::read_to_string(out_path).context(ReadingFileSnafu { path: out_path })?;
    let reference =
        fs::read_to_string(reference_path).context(ReadingFileSnafu {
            path: reference_path,
        })?;
    if produced != reference {
        warn!("Found differences with the reference file");
        print_diff(reference.as_str(), produced.as_str(), "\n");
        whatever!(
            "Difference detected between produced output and reference {}",
            reference_path
        );
    }
    Ok(())
}

fn join_path(root: &Path, rel: &str) -> String {
    let p: PathBuf = [root.display().to_string(), rel.to_string()].iter().collect();
    p.as_path().display().to_string()
}
