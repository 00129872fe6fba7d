mod config;
pub mod manual;

use log::{debug, warn};

use std::collections::{BTreeMap, BTreeSet};

pub use crate::config::*;

// **** Shuffle-order mapping ****

/// Mapping from document to the system index occupying each shuffled slot.
///
/// Built once from the mapping file and read-only afterward. The builder
/// tolerates sparse cells; [`ShuffleMap::check_complete`] is the mandatory
/// explicitness pass that every pipeline must run before resolving answers,
/// so that gaps surface up front instead of as resolution-time lookup errors.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ShuffleMap {
    slots: BTreeMap<u32, BTreeMap<u8, u32>>,
}

impl ShuffleMap {
    /// Builds the map from the raw rows of the mapping file.
    ///
    /// The first row is a header naming one document per column (after the
    /// first); data row `r` holds, per document column, the 1-based system
    /// index sitting at slot `r`. Empty cells are omitted.
    pub fn build(rows: &[Vec<String>]) -> Result<ShuffleMap, AlignErrors> {
        let mut slots: BTreeMap<u32, BTreeMap<u8, u32>> = BTreeMap::new();
        let header = match rows.first() {
            Some(h) => h,
            None => return Ok(ShuffleMap { slots }),
        };
        // Document id per data column, in header order. Columns with an empty
        // header cell carry no document and are skipped below.
        let mut documents: Vec<Option<u32>> = Vec::new();
        for (column, cell) in header.iter().enumerate().skip(1) {
            if cell.trim().is_empty() {
                documents.push(None);
                continue;
            }
            let document =
                cell.trim()
                    .parse::<u32>()
                    .map_err(|_| AlignErrors::MappingCell {
                        lineno: 1,
                        column,
                        content: cell.clone(),
                    })?;
            slots.insert(document, BTreeMap::new());
            documents.push(Some(document));
        }
        for (row_idx, row) in rows.iter().enumerate().skip(1) {
            let slot = row_idx as u8;
            for (column, cell) in row.iter().enumerate().skip(1) {
                if cell.trim().is_empty() {
                    continue;
                }
                let document = match documents.get(column - 1) {
                    Some(Some(d)) => *d,
                    _ => continue,
                };
                let system =
                    cell.trim()
                        .parse::<u32>()
                        .map_err(|_| AlignErrors::MappingCell {
                            lineno: row_idx + 1,
                            column,
                            content: cell.clone(),
                        })?;
                slots.entry(document).or_default().insert(slot, system);
            }
        }
        debug!("ShuffleMap::build: {} documents", slots.len());
        Ok(ShuffleMap { slots })
    }

    /// The mandatory explicitness pass: every known document must populate
    /// slots `1..=slots`, and the populated values must form a permutation of
    /// the system indices `1..=slots`. All violations are reported together.
    pub fn check_complete(&self, slots: u8) -> Result<(), AlignErrors> {
        let mut missing: Vec<(u32, u8)> = Vec::new();
        let mut bad_permutation: Vec<u32> = Vec::new();
        let full: BTreeSet<u32> = (1..=slots as u32).collect();
        for (document, by_slot) in self.slots.iter() {
            let mut seen: BTreeSet<u32> = BTreeSet::new();
            let mut complete = true;
            for slot in 1..=slots {
                match by_slot.get(&slot) {
                    Some(system) => {
                        seen.insert(*system);
                    }
                    None => {
                        missing.push((*document, slot));
                        complete = false;
                    }
                }
            }
            if complete && seen != full {
                bad_permutation.push(*document);
            }
        }
        if missing.is_empty() && bad_permutation.is_empty() {
            Ok(())
        } else {
            Err(AlignErrors::MalformedMapping {
                missing,
                bad_permutation,
            })
        }
    }

    /// Resolution-time probe. Absence here is a distinct failure from the
    /// completeness pass: an answer referenced a pair the mapping never
    /// declared.
    pub fn system_index(&self, document: u32, slot: u8) -> Result<u32, AlignErrors> {
        self.slots
            .get(&document)
            .and_then(|by_slot| by_slot.get(&slot))
            .copied()
            .ok_or(AlignErrors::MissingShuffleEntry { document, slot })
    }

    pub fn documents(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// **** Raw export decoding ****

/// Answer-column count that signals the alternate export layout: when the
/// default trim (3 leading, 1 trailing) leaves exactly this many columns, the
/// row never had the trailing comment column and only 2 leading columns are
/// metadata.
pub const FULL_TRIM_WIDTH: usize = 18;

/// Column holding the worker identity in every export layout.
const WORKER_COLUMN: usize = 1;

/// Extracts the numeric start offset embedded in an export file name, e.g.
/// "Likert 21-30.csv" with marker "Likert " yields 21.
pub fn start_offset_from_name(name: &str, marker: &str) -> Result<u32, AlignErrors> {
    let bad = || AlignErrors::BadFileName {
        name: name.to_string(),
    };
    let (_, rest) = name.split_once(marker).ok_or_else(bad)?;
    let digits = rest.split('-').next().ok_or_else(bad)?;
    digits.trim().parse::<u32>().map_err(|_| bad())
}

/// Applies the column-trim conventions of the raw exports and returns the
/// answer cells of one row.
pub fn trim_answer_columns(row: &[String], lineno: usize) -> Result<&[String], AlignErrors> {
    if row.len() < 4 {
        return Err(AlignErrors::RowLayout {
            lineno,
            width: row.len(),
        });
    }
    let trimmed = &row[3..row.len() - 1];
    if trimmed.len() == FULL_TRIM_WIDTH {
        // Alternate layout: redo the trim with one fewer leading column and
        // keep the last column, which is an answer here.
        Ok(&row[2..])
    } else {
        Ok(trimmed)
    }
}

fn worker_id(row: &[String]) -> Option<String> {
    row.get(WORKER_COLUMN).map(|s| s.trim().to_string())
}

/// Decodes the rows of one Likert export file. The first row is a header and
/// is skipped; `slots` is the number of shuffled answer slots per document
/// (the size of the system set).
///
/// Empty rating cells are tolerated: the answer is dropped and the document
/// recorded in `missing_documents` so completeness checks can exclude it.
pub fn decode_likert(
    rows: &[Vec<String>],
    start_offset: u32,
    slots: u8,
) -> Result<LikertDecode, AlignErrors> {
    let mut answers: Vec<RawAnswer> = Vec::new();
    let mut missing: BTreeSet<u32> = BTreeSet::new();
    for (idx, row) in rows.iter().enumerate().skip(1) {
        let lineno = idx + 1;
        let worker = worker_id(row);
        let cells = trim_answer_columns(row, lineno)?;
        debug!("decode_likert: line {}: {} answer cells", lineno, cells.len());
        for (i, cell) in cells.iter().enumerate() {
            let document = start_offset + (i as u32) / (slots as u32);
            if cell.is_empty() {
                missing.insert(document);
                continue;
            }
            let slot = (i % slots as usize) as u8 + 1;
            let score = cell
                .trim()
                .parse::<i64>()
                .map_err(|_| AlignErrors::BadScore {
                    lineno,
                    content: cell.clone(),
                })?;
            answers.push(RawAnswer {
                document,
                value: AnswerValue::Score { slot, score },
                worker: worker.clone(),
            });
        }
    }
    Ok(LikertDecode {
        answers,
        missing_documents: missing.into_iter().collect(),
    })
}

/// Decodes the rows of one Best-Worst export file. The first row is a header
/// and is skipped. Columns come in (best, worst) pairs per document; the last
/// character of a cell names the shuffled slot that was picked.
pub fn decode_bws(rows: &[Vec<String>], start_offset: u32) -> Result<Vec<RawAnswer>, AlignErrors> {
    let mut answers: Vec<RawAnswer> = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(1) {
        let lineno = idx + 1;
        let worker = worker_id(row);
        let cells = trim_answer_columns(row, lineno)?;
        for (i, cell) in cells.iter().enumerate() {
            let document = start_offset + (i as u32) / 2;
            if cell.is_empty() {
                return Err(AlignErrors::EmptyBwsCell { lineno, document });
            }
            let role = if i % 2 == 0 { Role::Best } else { Role::Worst };
            let slot = match cell.chars().last().and_then(|c| c.to_digit(10)) {
                Some(d) if (1..=4).contains(&d) => d as u8,
                _ => {
                    return Err(AlignErrors::BadSlotDigit {
                        lineno,
                        content: cell.clone(),
                    })
                }
            };
            answers.push(RawAnswer {
                document,
                value: AnswerValue::SlotChoice { role, slot },
                worker: worker.clone(),
            });
        }
    }
    Ok(answers)
}

// **** Resolution ****

fn resolved_system<'a>(
    map: &ShuffleMap,
    systems: &'a SystemSet,
    document: u32,
    slot: u8,
) -> Result<&'a str, AlignErrors> {
    let index = map.system_index(document, slot)?;
    systems
        .by_index(index)
        .ok_or(AlignErrors::UnknownSystemIndex { document, index })
}

/// De-shuffles Likert answers into per-(document, system) rating lists.
pub fn resolve_likert(
    map: &ShuffleMap,
    systems: &SystemSet,
    answers: &[RawAnswer],
) -> Result<LikertFacts, AlignErrors> {
    let mut facts = LikertFacts::new();
    for answer in answers {
        let (slot, score) = match &answer.value {
            AnswerValue::Score { slot, score } => (*slot, *score),
            AnswerValue::SlotChoice { .. } => {
                warn!(
                    "resolve_likert: skipping best/worst answer for document {}",
                    answer.document
                );
                continue;
            }
        };
        let system = resolved_system(map, systems, answer.document, slot)?;
        facts.push(answer.document, system, answer.worker.clone(), score);
    }
    Ok(facts)
}

/// De-shuffles Best-Worst answers into per-(document, role) pick lists.
pub fn resolve_bws(
    map: &ShuffleMap,
    systems: &SystemSet,
    answers: &[RawAnswer],
) -> Result<BwsFacts, AlignErrors> {
    let mut facts = BwsFacts::new();
    for answer in answers {
        let (role, slot) = match &answer.value {
            AnswerValue::SlotChoice { role, slot } => (*role, *slot),
            AnswerValue::Score { .. } => {
                warn!(
                    "resolve_bws: skipping rating answer for document {}",
                    answer.document
                );
                continue;
            }
        };
        let system = resolved_system(map, systems, answer.document, slot)?;
        facts.push(answer.document, role, answer.worker.clone(), system);
    }
    Ok(facts)
}

// **** Validation ****

/// Completeness pass over resolved Likert facts: every document of the range
/// must carry all systems, each with one rating per annotator. Documents in
/// `excluded` (missing-annotation diagnostics) are skipped. All violations
/// are collected before failing.
pub fn validate_likert(
    facts: &LikertFacts,
    systems: &SystemSet,
    rules: &ChunkingRules,
    excluded: &BTreeSet<u32>,
) -> Result<(), AlignErrors> {
    let mut faults: Vec<IntegrityFault> = Vec::new();
    for document in 1..=rules.document_count {
        if excluded.contains(&document) {
            continue;
        }
        let by_system = match facts.scores.get(&document) {
            Some(m) => m,
            None => {
                faults.push(IntegrityFault {
                    document,
                    subject: "systems".to_string(),
                    expected: systems.len(),
                    observed: 0,
                });
                continue;
            }
        };
        if by_system.len() != systems.len() {
            faults.push(IntegrityFault {
                document,
                subject: "systems".to_string(),
                expected: systems.len(),
                observed: by_system.len(),
            });
        }
        for (system, ratings) in by_system.iter() {
            if ratings.len() != rules.annotators_per_chunk {
                faults.push(IntegrityFault {
                    document,
                    subject: system.clone(),
                    expected: rules.annotators_per_chunk,
                    observed: ratings.len(),
                });
            }
        }
    }
    if faults.is_empty() {
        Ok(())
    } else {
        Err(AlignErrors::DataIntegrity { faults })
    }
}

/// Completeness pass over resolved Best-Worst facts.
///
/// When a pick list holds exactly one extra entry (an upstream double count),
/// the repair policy drops the FIRST entry and re-checks. The policy is never
/// applied to any other length mismatch. Returns the repaired (document,
/// role) pairs; all remaining violations are collected before failing.
pub fn validate_bws(
    facts: &mut BwsFacts,
    rules: &ChunkingRules,
) -> Result<Vec<(u32, Role)>, AlignErrors> {
    let expected = rules.annotators_per_chunk;
    let mut faults: Vec<IntegrityFault> = Vec::new();
    let mut repaired: Vec<(u32, Role)> = Vec::new();
    for document in 1..=rules.document_count {
        match facts.picks.get_mut(&document) {
            None => {
                for role in [Role::Best, Role::Worst] {
                    faults.push(IntegrityFault {
                        document,
                        subject: role.label().to_string(),
                        expected,
                        observed: 0,
                    });
                }
            }
            Some(document_picks) => {
                for role in [Role::Best, Role::Worst] {
                    let picks = document_picks.picks_mut(role);
                    if picks.len() == expected + 1 {
                        warn!(
                            "document {}: {} picks held one extra entry, dropping the first",
                            document,
                            role.label()
                        );
                        picks.remove(0);
                        repaired.push((document, role));
                    }
                    if picks.len() != expected {
                        faults.push(IntegrityFault {
                            document,
                            subject: role.label().to_string(),
                            expected,
                            observed: picks.len(),
                        });
                    }
                }
            }
        }
    }
    if faults.is_empty() {
        Ok(repaired)
    } else {
        Err(AlignErrors::DataIntegrity { faults })
    }
}

// **** Aggregation ****

fn document_chunks(rules: &ChunkingRules) -> Vec<Vec<u32>> {
    let documents: Vec<u32> = (1..=rules.document_count).collect();
    documents
        .chunks(rules.chunk_size as usize)
        .map(|c| c.to_vec())
        .collect()
}

fn single_fault(document: u32, subject: &str, expected: usize, observed: usize) -> AlignErrors {
    AlignErrors::DataIntegrity {
        faults: vec![IntegrityFault {
            document,
            subject: subject.to_string(),
            expected,
            observed,
        }],
    }
}

/// Flattens validated Likert facts into the output table, renumbering
/// annotators globally from their chunk position. Documents in `excluded`
/// are skipped; they were already surfaced through the diagnostics report.
pub fn likert_records(
    facts: &LikertFacts,
    systems: &SystemSet,
    rules: &ChunkingRules,
    corpus: &str,
    excluded: &BTreeSet<u32>,
) -> Result<Vec<LikertRecord>, AlignErrors> {
    let mut records: Vec<LikertRecord> = Vec::new();
    for (chunk_idx, chunk) in document_chunks(rules).iter().enumerate() {
        for annotator in 0..rules.annotators_per_chunk {
            let annotator_id = (chunk_idx * rules.annotators_per_chunk + annotator + 1) as u32;
            for document in chunk.iter() {
                if excluded.contains(document) {
                    continue;
                }
                for system in systems.names() {
                    let ratings = facts
                        .scores
                        .get(document)
                        .and_then(|m| m.get(system))
                        .ok_or_else(|| {
                            single_fault(*document, system, rules.annotators_per_chunk, 0)
                        })?;
                    let rating = ratings.get(annotator).ok_or_else(|| {
                        single_fault(
                            *document,
                            system,
                            rules.annotators_per_chunk,
                            ratings.len(),
                        )
                    })?;
                    records.push(LikertRecord {
                        annotator: annotator_id,
                        document: *document,
                        system: system.clone(),
                        corpus: corpus.to_string(),
                        score: rating.score,
                    });
                }
            }
        }
    }
    Ok(records)
}

/// Flattens validated Best-Worst facts into rank records: 4 for the
/// annotator's best pick, 1 for the worst, 2 otherwise. The neutral bucket
/// deliberately conflates the middle ranks, as collected.
pub fn bws_records(
    facts: &BwsFacts,
    systems: &SystemSet,
    rules: &ChunkingRules,
    corpus: &str,
) -> Result<Vec<BwsRecord>, AlignErrors> {
    let mut records: Vec<BwsRecord> = Vec::new();
    for (chunk_idx, chunk) in document_chunks(rules).iter().enumerate() {
        for annotator in 0..rules.annotators_per_chunk {
            let annotator_id = (chunk_idx * rules.annotators_per_chunk + annotator + 1) as u32;
            for document in chunk.iter() {
                let document_picks = facts
                    .picks
                    .get(document)
                    .ok_or_else(|| single_fault(*document, "best", rules.annotators_per_chunk, 0))?;
                let best = document_picks.best.get(annotator).ok_or_else(|| {
                    single_fault(
                        *document,
                        "best",
                        rules.annotators_per_chunk,
                        document_picks.best.len(),
                    )
                })?;
                let worst = document_picks.worst.get(annotator).ok_or_else(|| {
                    single_fault(
                        *document,
                        "worst",
                        rules.annotators_per_chunk,
                        document_picks.worst.len(),
                    )
                })?;
                for system in systems.names() {
                    let rank: u8 = if *system == best.system {
                        4
                    } else if *system == worst.system {
                        1
                    } else {
                        2
                    };
                    records.push(BwsRecord {
                        annotator: annotator_id,
                        document: *document,
                        system: system.clone(),
                        corpus: corpus.to_string(),
                        rank,
                    });
                }
            }
        }
    }
    Ok(records)
}

// **** Consistency comparison ****

/// Joins a redo Likert pass against the original by (document, system) group
/// and worker identity; the per-worker metric is the mean absolute score
/// difference over the matched pairs.
///
/// A group absent from the original (a dropped or incomplete task) skips its
/// pairs silently, and so does a worker with no match inside the group.
pub fn compare_likert(
    original: &LikertFacts,
    redo: &LikertFacts,
) -> Result<ConsistencyReport, AlignErrors> {
    let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (document, by_system) in redo.scores.iter() {
        for (system, redo_ratings) in by_system.iter() {
            let original_ratings = match original
                .scores
                .get(document)
                .and_then(|m| m.get(system))
            {
                Some(r) => r,
                None => continue,
            };
            for redo_rating in redo_ratings.iter() {
                let worker = match &redo_rating.worker {
                    Some(w) => w,
                    None => continue,
                };
                let matched = original_ratings
                    .iter()
                    .find(|r| r.worker.as_deref() == Some(worker.as_str()));
                match matched {
                    Some(original_rating) => {
                        let diff = (original_rating.score - redo_rating.score).abs() as f64;
                        samples.entry(worker.clone()).or_default().push(diff);
                    }
                    None => {
                        debug!(
                            "compare_likert: worker {} absent from original group ({}, {})",
                            worker, document, system
                        );
                    }
                }
            }
        }
    }
    report_from(samples)
}

/// Joins a redo Best-Worst pass against the original by (document, role) and
/// worker identity; the per-worker metric is the mismatch rate over the
/// matched pairs.
pub fn compare_bws(original: &BwsFacts, redo: &BwsFacts) -> Result<ConsistencyReport, AlignErrors> {
    let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (document, redo_picks) in redo.picks.iter() {
        for role in [Role::Best, Role::Worst] {
            let original_picks = match original.picks.get(document) {
                Some(p) => p.picks(role),
                None => continue,
            };
            for redo_pick in redo_picks.picks(role).iter() {
                let worker = match &redo_pick.worker {
                    Some(w) => w,
                    None => continue,
                };
                let matched = original_picks
                    .iter()
                    .find(|p| p.worker.as_deref() == Some(worker.as_str()));
                if let Some(original_pick) = matched {
                    let mismatch = if original_pick.system == redo_pick.system {
                        0.0
                    } else {
                        1.0
                    };
                    samples.entry(worker.clone()).or_default().push(mismatch);
                }
            }
        }
    }
    report_from(samples)
}

fn report_from(samples: BTreeMap<String, Vec<f64>>) -> Result<ConsistencyReport, AlignErrors> {
    let mut per_worker: BTreeMap<String, f64> = BTreeMap::new();
    for (worker, values) in samples.into_iter() {
        if values.is_empty() {
            continue;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        per_worker.insert(worker, mean);
    }
    if per_worker.is_empty() {
        return Err(AlignErrors::EmptyComparison);
    }
    let mean = per_worker.values().sum::<f64>() / per_worker.len() as f64;
    Ok(ConsistencyReport { per_worker, mean })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
        cells
            .iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn demo_systems() -> SystemSet {
        SystemSet::new(&[
            "pegasus".to_string(),
            "prophetnet".to_string(),
            "bart".to_string(),
            "bertextabs".to_string(),
        ])
    }

    // Five documents; each column is a permutation of 1..=4.
    fn demo_map() -> ShuffleMap {
        let mapping = rows(&[
            &["", "1", "2", "3", "4", "5"],
            &["1", "1", "2", "3", "4", "1"],
            &["2", "2", "1", "4", "3", "2"],
            &["3", "3", "4", "1", "2", "3"],
            &["4", "4", "3", "2", "1", "4"],
        ]);
        ShuffleMap::build(&mapping).unwrap()
    }

    #[test]
    fn shuffle_map_build_and_probe() {
        let map = demo_map();
        assert_eq!(map.len(), 5);
        assert!(map.check_complete(4).is_ok());
        assert_eq!(map.system_index(1, 1).unwrap(), 1);
        assert_eq!(map.system_index(2, 1).unwrap(), 2);
        assert_eq!(map.system_index(3, 2).unwrap(), 4);
        assert_eq!(
            map.system_index(99, 1),
            Err(AlignErrors::MissingShuffleEntry {
                document: 99,
                slot: 1
            })
        );
    }

    #[test]
    fn shuffle_map_reports_all_missing_pairs() {
        let mapping = rows(&[
            &["", "1", "2"],
            &["1", "1", "2"],
            &["2", "2", ""],
            &["3", "3", "4"],
            &["4", "4", ""],
        ]);
        let map = ShuffleMap::build(&mapping).unwrap();
        match map.check_complete(4) {
            Err(AlignErrors::MalformedMapping {
                missing,
                bad_permutation,
            }) => {
                assert_eq!(missing, vec![(2, 2), (2, 4)]);
                assert!(bad_permutation.is_empty());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn shuffle_map_rejects_non_permutation() {
        let mapping = rows(&[
            &["", "1"],
            &["1", "1"],
            &["2", "1"],
            &["3", "2"],
            &["4", "3"],
        ]);
        let map = ShuffleMap::build(&mapping).unwrap();
        match map.check_complete(4) {
            Err(AlignErrors::MalformedMapping {
                missing,
                bad_permutation,
            }) => {
                assert!(missing.is_empty());
                assert_eq!(bad_permutation, vec![1]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn start_offset_extraction() {
        assert_eq!(start_offset_from_name("Likert 21-30.csv", "Likert ").unwrap(), 21);
        assert_eq!(start_offset_from_name("BWS 1-10.csv", "BWS ").unwrap(), 1);
        assert!(start_offset_from_name("notes.csv", "Likert ").is_err());
        assert!(start_offset_from_name("Likert x-10.csv", "Likert ").is_err());
    }

    fn numbered_row(width: usize) -> Vec<String> {
        (0..width).map(|i| format!("c{}", i)).collect()
    }

    #[test]
    fn trim_default_layout() {
        let row = numbered_row(24);
        let cells = trim_answer_columns(&row, 2).unwrap();
        assert_eq!(cells.len(), 20);
        assert_eq!(cells[0], "c3");
        assert_eq!(cells[19], "c22");
    }

    #[test]
    fn trim_detects_alternate_layout() {
        // 22 columns: the default trim leaves 18, which re-trims to 2 leading
        // columns and shifts every answer one column left.
        let row = numbered_row(22);
        let cells = trim_answer_columns(&row, 2).unwrap();
        assert_eq!(cells.len(), 20);
        assert_eq!(cells[0], "c2");
        assert_eq!(cells[19], "c21");
    }

    #[test]
    fn trim_rejects_short_rows() {
        let row = numbered_row(3);
        assert_eq!(
            trim_answer_columns(&row, 7),
            Err(AlignErrors::RowLayout { lineno: 7, width: 3 })
        );
    }

    #[test]
    fn decode_likert_offsets() {
        let raw = rows(&[
            &["h", "h", "h", "h", "h", "h", "h", "h", "h", "h", "h", "h", "h"],
            &["x", " W1 ", "x", "7", "8", "9", "10", "1", "2", "3", "4", "5", "done"],
        ]);
        let decode = decode_likert(&raw, 21, 4).unwrap();
        assert!(decode.missing_documents.is_empty());
        assert_eq!(decode.answers.len(), 9);
        let first = &decode.answers[0];
        assert_eq!(first.document, 21);
        assert_eq!(first.worker.as_deref(), Some("W1"));
        assert_eq!(
            first.value,
            AnswerValue::Score { slot: 1, score: 7 }
        );
        let fifth = &decode.answers[4];
        assert_eq!(fifth.document, 22);
        assert_eq!(fifth.value, AnswerValue::Score { slot: 1, score: 1 });
        let last = &decode.answers[8];
        assert_eq!(last.document, 23);
        assert_eq!(last.value, AnswerValue::Score { slot: 1, score: 5 });
    }

    #[test]
    fn decode_likert_records_missing_cells() {
        let raw = rows(&[
            &["h", "h", "h", "h", "h", "h", "h", "h", "h"],
            &["x", "W1", "x", "7", "", "9", "10", "2", "done"],
        ]);
        let decode = decode_likert(&raw, 5, 4).unwrap();
        assert_eq!(decode.missing_documents, vec![5]);
        assert_eq!(decode.answers.len(), 4);
    }

    #[test]
    fn decode_bws_pairs_and_slot_digits() {
        let raw = rows(&[
            &["h", "h", "h", "h", "h", "h", "h", "h"],
            &["x", "W2", "x", "Answer 1", "Answer 3", "Answer 4", "Answer 2", "done"],
        ]);
        let answers = decode_bws(&raw, 11).unwrap();
        assert_eq!(answers.len(), 4);
        assert_eq!(answers[0].document, 11);
        assert_eq!(
            answers[0].value,
            AnswerValue::SlotChoice {
                role: Role::Best,
                slot: 1
            }
        );
        assert_eq!(
            answers[1].value,
            AnswerValue::SlotChoice {
                role: Role::Worst,
                slot: 3
            }
        );
        assert_eq!(answers[2].document, 12);
        assert_eq!(
            answers[2].value,
            AnswerValue::SlotChoice {
                role: Role::Best,
                slot: 4
            }
        );
    }

    #[test]
    fn decode_bws_rejects_empty_and_bad_cells() {
        let empty = rows(&[
            &["h", "h", "h", "h", "h", "h"],
            &["x", "W2", "x", "Answer 1", "", "done"],
        ]);
        assert_eq!(
            decode_bws(&empty, 11),
            Err(AlignErrors::EmptyBwsCell {
                lineno: 2,
                document: 11
            })
        );
        let bad = rows(&[
            &["h", "h", "h", "h", "h", "h"],
            &["x", "W2", "x", "Answer 1", "Answer x", "done"],
        ]);
        assert_eq!(
            decode_bws(&bad, 11),
            Err(AlignErrors::BadSlotDigit {
                lineno: 2,
                content: "Answer x".to_string()
            })
        );
    }

    #[test]
    fn resolver_round_trip() {
        let map = demo_map();
        let systems = demo_systems();
        // One rating per (document, slot): resolving all slots of a document
        // must cover the full system set exactly once.
        let mut answers: Vec<RawAnswer> = Vec::new();
        for document in map.documents() {
            for slot in 1..=4u8 {
                answers.push(RawAnswer {
                    document,
                    value: AnswerValue::Score { slot, score: 6 },
                    worker: None,
                });
            }
        }
        let facts = resolve_likert(&map, &systems, &answers).unwrap();
        for (_, by_system) in facts.scores.iter() {
            assert_eq!(by_system.len(), 4);
            for ratings in by_system.values() {
                assert_eq!(ratings.len(), 1);
            }
        }
        // Spot check: document 2 slot 1 carries system index 2.
        assert!(facts.scores[&2].contains_key("prophetnet"));
        assert_eq!(facts.scores[&2]["prophetnet"][0].score, 6);
    }

    fn full_likert_facts(rules: &ChunkingRules, systems: &SystemSet) -> LikertFacts {
        let mut facts = LikertFacts::new();
        for document in 1..=rules.document_count {
            for system in systems.names() {
                for annotator in 0..rules.annotators_per_chunk {
                    facts.push(document, system, None, annotator as i64 + 5);
                }
            }
        }
        facts
    }

    #[test]
    fn likert_aggregation_record_count() {
        let rules = ChunkingRules::DEFAULT_RULES;
        let systems = demo_systems();
        let facts = full_likert_facts(&rules, &systems);
        let excluded = BTreeSet::new();
        validate_likert(&facts, &systems, &rules, &excluded).unwrap();
        let records = likert_records(&facts, &systems, &rules, "cnndm", &excluded).unwrap();
        // 100 documents x 3 annotators x 4 systems.
        assert_eq!(records.len(), 1200);
        let first = &records[0];
        assert_eq!(first.annotator, 1);
        assert_eq!(first.document, 1);
        assert_eq!(first.system, "pegasus");
        assert_eq!(first.corpus, "cnndm");
        assert_eq!(first.score, 5);
        // Documents of the second chunk are rated by annotators 4..=6.
        let doc6: Vec<u32> = records
            .iter()
            .filter(|r| r.document == 6)
            .map(|r| r.annotator)
            .collect();
        assert_eq!(doc6, vec![4, 4, 4, 4, 5, 5, 5, 5, 6, 6, 6, 6]);
    }

    #[test]
    fn likert_validation_collects_faults() {
        let rules = ChunkingRules {
            document_count: 2,
            chunk_size: 2,
            annotators_per_chunk: 3,
        };
        let systems = demo_systems();
        let mut facts = LikertFacts::new();
        for system in systems.names() {
            for _ in 0..3 {
                facts.push(1, system, None, 7);
            }
        }
        // Document 1 misses one rating for bart; document 2 is absent.
        facts.scores.get_mut(&1).unwrap().get_mut("bart").unwrap().pop();
        match validate_likert(&facts, &systems, &rules, &BTreeSet::new()) {
            Err(AlignErrors::DataIntegrity { faults }) => {
                assert_eq!(faults.len(), 2);
                assert_eq!(faults[0].document, 1);
                assert_eq!(faults[0].subject, "bart");
                assert_eq!(faults[0].observed, 2);
                assert_eq!(faults[1].document, 2);
                assert_eq!(faults[1].observed, 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn likert_excluded_documents_are_skipped() {
        let rules = ChunkingRules {
            document_count: 4,
            chunk_size: 2,
            annotators_per_chunk: 3,
        };
        let systems = demo_systems();
        let mut facts = full_likert_facts(&rules, &systems);
        // Document 3 lost an annotation upstream.
        facts.scores.get_mut(&3).unwrap().get_mut("pegasus").unwrap().pop();
        let excluded: BTreeSet<u32> = [3].into_iter().collect();
        validate_likert(&facts, &systems, &rules, &excluded).unwrap();
        let records = likert_records(&facts, &systems, &rules, "xsum", &excluded).unwrap();
        assert_eq!(records.len(), 3 * 3 * 4);
        assert!(records.iter().all(|r| r.document != 3));
    }

    fn push_picks(facts: &mut BwsFacts, document: u32, role: Role, systems: &[(&str, &str)]) {
        for (worker, system) in systems {
            facts.push(document, role, Some(worker.to_string()), system);
        }
    }

    #[test]
    fn bws_drop_first_repair() {
        let rules = ChunkingRules {
            document_count: 1,
            chunk_size: 1,
            annotators_per_chunk: 3,
        };
        let mut facts = BwsFacts::new();
        // Four best picks: one extra, the first gets dropped.
        push_picks(
            &mut facts,
            1,
            Role::Best,
            &[("W0", "bart"), ("W1", "pegasus"), ("W2", "bart"), ("W3", "bart")],
        );
        push_picks(
            &mut facts,
            1,
            Role::Worst,
            &[("W1", "prophetnet"), ("W2", "prophetnet"), ("W3", "bertextabs")],
        );
        let repaired = validate_bws(&mut facts, &rules).unwrap();
        assert_eq!(repaired, vec![(1, Role::Best)]);
        let best = &facts.picks[&1].best;
        assert_eq!(best.len(), 3);
        assert_eq!(best[0].worker.as_deref(), Some("W1"));
    }

    #[test]
    fn bws_repair_never_generalizes() {
        let rules = ChunkingRules {
            document_count: 1,
            chunk_size: 1,
            annotators_per_chunk: 3,
        };
        let mut facts = BwsFacts::new();
        // Five best picks: two extra entries, no repair applies.
        push_picks(
            &mut facts,
            1,
            Role::Best,
            &[
                ("W0", "bart"),
                ("W1", "bart"),
                ("W2", "bart"),
                ("W3", "bart"),
                ("W4", "bart"),
            ],
        );
        push_picks(
            &mut facts,
            1,
            Role::Worst,
            &[("W1", "pegasus"), ("W2", "pegasus")],
        );
        match validate_bws(&mut facts, &rules) {
            Err(AlignErrors::DataIntegrity { faults }) => {
                assert_eq!(faults.len(), 2);
                assert_eq!(faults[0].subject, "best");
                assert_eq!(faults[0].observed, 5);
                assert_eq!(faults[1].subject, "worst");
                assert_eq!(faults[1].observed, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn bws_ranks_one_best_one_worst_rest_neutral() {
        let rules = ChunkingRules {
            document_count: 2,
            chunk_size: 2,
            annotators_per_chunk: 1,
        };
        let systems = demo_systems();
        let mut facts = BwsFacts::new();
        facts.push(1, Role::Best, None, "pegasus");
        facts.push(1, Role::Worst, None, "bart");
        facts.push(2, Role::Best, None, "prophetnet");
        facts.push(2, Role::Worst, None, "pegasus");
        let records = bws_records(&facts, &systems, &rules, "xsum").unwrap();
        assert_eq!(records.len(), 8);
        let doc1: Vec<u8> = records
            .iter()
            .filter(|r| r.document == 1)
            .map(|r| r.rank)
            .collect();
        assert_eq!(doc1, vec![4, 2, 1, 2]);
        for document in [1, 2] {
            let ranks: Vec<u8> = records
                .iter()
                .filter(|r| r.document == document)
                .map(|r| r.rank)
                .collect();
            assert_eq!(ranks.iter().filter(|r| **r == 4).count(), 1);
            assert_eq!(ranks.iter().filter(|r| **r == 1).count(), 1);
            assert_eq!(ranks.iter().filter(|r| **r == 2).count(), 2);
        }
    }

    #[test]
    fn likert_consistency_hand_computed() {
        let mut original = LikertFacts::new();
        original.push(1, "pegasus", Some("W1".to_string()), 3);
        original.push(2, "pegasus", Some("W1".to_string()), 4);
        let mut redo = LikertFacts::new();
        redo.push(1, "pegasus", Some("W1".to_string()), 5);
        redo.push(2, "pegasus", Some("W1".to_string()), 4);
        let report = compare_likert(&original, &redo).unwrap();
        assert_eq!(report.per_worker.len(), 1);
        // Pairs (3, 5) and (4, 4): mean absolute difference (2 + 0) / 2.
        assert_eq!(report.per_worker["W1"], 1.0);
        assert_eq!(report.mean, 1.0);
    }

    #[test]
    fn likert_consistency_skips_unmatched_pairs() {
        let mut original = LikertFacts::new();
        original.push(1, "pegasus", Some("W1".to_string()), 3);
        let mut redo = LikertFacts::new();
        redo.push(1, "pegasus", Some("W1".to_string()), 6);
        // No (document, system) group in the original: skipped, not an error.
        redo.push(9, "pegasus", Some("W1".to_string()), 1);
        // No matching worker in the group: skipped as well.
        redo.push(1, "pegasus", Some("W2".to_string()), 2);
        let report = compare_likert(&original, &redo).unwrap();
        assert_eq!(report.per_worker.len(), 1);
        assert_eq!(report.per_worker["W1"], 3.0);
    }

    #[test]
    fn bws_consistency_mismatch_rate() {
        let mut original = BwsFacts::new();
        original.push(1, Role::Best, Some("W1".to_string()), "pegasus");
        original.push(1, Role::Worst, Some("W1".to_string()), "bart");
        original.push(1, Role::Best, Some("W2".to_string()), "prophetnet");
        let mut redo = BwsFacts::new();
        redo.push(1, Role::Best, Some("W1".to_string()), "bart");
        redo.push(1, Role::Worst, Some("W1".to_string()), "bart");
        redo.push(1, Role::Best, Some("W2".to_string()), "prophetnet");
        let report = compare_bws(&original, &redo).unwrap();
        assert_eq!(report.per_worker["W1"], 0.5);
        assert_eq!(report.per_worker["W2"], 0.0);
        assert_eq!(report.mean, 0.25);
    }

    #[test]
    fn empty_comparison_is_an_error() {
        let original = LikertFacts::new();
        let redo = LikertFacts::new();
        assert_eq!(
            compare_likert(&original, &redo),
            Err(AlignErrors::EmptyComparison)
        );
    }
}
