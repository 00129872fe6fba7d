// Primitives for reading the delimited-text inputs.

use crate::pipeline::*;

/// One raw export file, with the start offset decoded from its name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RawFile {
    pub path: String,
    pub file_name: String,
    pub start_offset: u32,
}

/// Reads a whole delimited-text file into rows of fields. The raw exports
/// have variable row widths by design, so the reader must not enforce one.
pub fn read_rows(path: &str) -> RunResult<Vec<Vec<String>>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.into_records() {
        let record = record.context(CsvLineParseSnafu { path })?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    debug!("read_rows: {}: {} rows", path, rows.len());
    Ok(rows)
}

/// Lists the export files of one annotation directory, in the canonical
/// order: by embedded start offset, then by file name. Annotator positions
/// downstream depend on this order, so it must not be left to the file
/// system.
pub fn list_annotation_files(dir: &str, marker: &str) -> RunResult<Vec<RawFile>> {
    let entries = fs::read_dir(dir).context(ListingDirSnafu { path: dir })?;
    let mut files: Vec<RawFile> = Vec::new();
    for entry in entries {
        let entry = entry.context(ListingDirSnafu { path: dir })?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !file_name.ends_with(".csv") || !file_name.contains(marker) {
            debug!("list_annotation_files: skipping {}", file_name);
            continue;
        }
        let start_offset = start_offset_from_name(&file_name, marker).context(AlignmentSnafu {
            path: file_name.clone(),
        })?;
        files.push(RawFile {
            path: entry.path().display().to_string(),
            file_name,
            start_offset,
        });
    }
    files.sort_by(|a, b| (a.start_offset, &a.file_name).cmp(&(b.start_offset, &b.file_name)));
    Ok(files)
}
