// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// The collection scheme of a raw export batch.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Scheme {
    /// Numeric quality ratings, one answer column per (document, slot).
    Likert,
    /// Best-Worst Scaling, one (best, worst) column pair per document.
    Bws,
}

impl Scheme {
    /// The token preceding the numeric start offset in the export file names,
    /// e.g. "Likert 21-30.csv".
    pub fn default_marker(&self) -> &'static str {
        match self {
            Scheme::Likert => "Likert ",
            Scheme::Bws => "BWS ",
        }
    }
}

/// The two forced choices collected by a Best-Worst task.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord)]
pub enum Role {
    Best,
    Worst,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Best => "best",
            Role::Worst => "worst",
        }
    }
}

/// The closed, ordered set of summarization systems under evaluation.
///
/// The mapping file refers to systems by their 1-based position in this set,
/// and the output records follow its order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SystemSet {
    names: Vec<String>,
}

impl SystemSet {
    pub fn new(names: &[String]) -> SystemSet {
        SystemSet {
            names: names.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolves a 1-based system index from the mapping file.
    pub fn by_index(&self, index: u32) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.names.get((index - 1) as usize).map(|s| s.as_str())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// The fixed shape of the annotation campaign.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ChunkingRules {
    /// Documents are numbered 1..=document_count.
    pub document_count: u32,
    /// Contiguous documents handed to one annotator group.
    pub chunk_size: u32,
    /// Annotators assigned to each chunk.
    pub annotators_per_chunk: usize,
}

impl ChunkingRules {
    pub const DEFAULT_RULES: ChunkingRules = ChunkingRules {
        document_count: 100,
        chunk_size: 5,
        annotators_per_chunk: 3,
    };
}

/// One answer cell from a raw export, before de-shuffling.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RawAnswer {
    pub document: u32,
    pub value: AnswerValue,
    pub worker: Option<String>,
}

/// The scheme-specific interpretation of an answer cell. The resolver is
/// generic over this: both variants go through the same shuffle-map lookup.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnswerValue {
    /// A numeric rating for the summary sitting at the given shuffled slot.
    Score { slot: u8, score: i64 },
    /// A best/worst pick naming a shuffled slot.
    SlotChoice { role: Role, slot: u8 },
}

/// Result of decoding one Likert export file.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LikertDecode {
    pub answers: Vec<RawAnswer>,
    /// Documents with at least one empty rating cell in this file. They are
    /// excluded from the completeness guarantees downstream.
    pub missing_documents: Vec<u32>,
}

// ******** Output data structures *********

/// One Likert rating attributed to its true system.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScoredAnnotation {
    pub worker: Option<String>,
    pub score: i64,
}

/// De-shuffled Likert facts: document, then system name, then the ratings in
/// annotator arrival order. The arrival order is load-bearing: the aggregator
/// indexes these lists by annotator position.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct LikertFacts {
    pub scores: BTreeMap<u32, BTreeMap<String, Vec<ScoredAnnotation>>>,
}

impl LikertFacts {
    pub fn new() -> LikertFacts {
        LikertFacts::default()
    }

    pub fn push(&mut self, document: u32, system: &str, worker: Option<String>, score: i64) {
        self.scores
            .entry(document)
            .or_default()
            .entry(system.to_string())
            .or_default()
            .push(ScoredAnnotation { worker, score });
    }
}

/// One best/worst pick attributed to its true system.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChosenSystem {
    pub worker: Option<String>,
    pub system: String,
}

/// The picks collected for one document, per role, in annotator arrival order.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct BwsDocument {
    pub best: Vec<ChosenSystem>,
    pub worst: Vec<ChosenSystem>,
}

impl BwsDocument {
    pub fn picks(&self, role: Role) -> &[ChosenSystem] {
        match role {
            Role::Best => &self.best,
            Role::Worst => &self.worst,
        }
    }

    pub(crate) fn picks_mut(&mut self, role: Role) -> &mut Vec<ChosenSystem> {
        match role {
            Role::Best => &mut self.best,
            Role::Worst => &mut self.worst,
        }
    }
}

/// De-shuffled Best-Worst facts.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct BwsFacts {
    pub picks: BTreeMap<u32, BwsDocument>,
}

impl BwsFacts {
    pub fn new() -> BwsFacts {
        BwsFacts::default()
    }

    pub fn push(&mut self, document: u32, role: Role, worker: Option<String>, system: &str) {
        self.picks
            .entry(document)
            .or_default()
            .picks_mut(role)
            .push(ChosenSystem {
                worker,
                system: system.to_string(),
            });
    }
}

/// One row of the normalized flat output table (Likert).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LikertRecord {
    pub annotator: u32,
    pub document: u32,
    pub system: String,
    pub corpus: String,
    pub score: i64,
}

/// One row of the normalized flat output table (BWS).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BwsRecord {
    pub annotator: u32,
    pub document: u32,
    pub system: String,
    pub corpus: String,
    pub rank: u8,
}

/// Per-worker consistency metrics between an original and a redo pass.
#[derive(PartialEq, Debug, Clone)]
pub struct ConsistencyReport {
    pub per_worker: BTreeMap<String, f64>,
    /// Mean of the per-worker metrics.
    pub mean: f64,
}

/// One completeness violation found by the post-collection validation pass.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct IntegrityFault {
    pub document: u32,
    /// System name, role label, or "systems" for a wrong system count.
    pub subject: String,
    pub expected: usize,
    pub observed: usize,
}

/// Errors that prevent the alignment from completing successfully.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AlignErrors {
    /// The mapping file fails the explicitness pass: (document, slot) pairs
    /// with no entry, and documents whose slot values are not a permutation
    /// of the system indices.
    MalformedMapping {
        missing: Vec<(u32, u8)>,
        bad_permutation: Vec<u32>,
    },
    /// A mapping cell could not be parsed as an integer.
    MappingCell {
        lineno: usize,
        column: usize,
        content: String,
    },
    /// A (document, slot) pair probed during resolution has no mapping entry.
    MissingShuffleEntry { document: u32, slot: u8 },
    /// The mapping names a system index outside the configured system set.
    UnknownSystemIndex { document: u32, index: u32 },
    /// A raw row's column count matches neither export layout.
    RowLayout { lineno: usize, width: usize },
    /// An empty cell in a Best-Worst export. Unlike Likert, every pick cell
    /// of a BWS batch is mandatory.
    EmptyBwsCell { lineno: usize, document: u32 },
    /// A Best-Worst cell whose last character is not a slot digit 1..=4.
    BadSlotDigit { lineno: usize, content: String },
    /// A Likert cell that is not an integer score.
    BadScore { lineno: usize, content: String },
    /// An export file name without the marker + offset convention.
    BadFileName { name: String },
    /// Aggregate completeness violations from the validation pass.
    DataIntegrity { faults: Vec<IntegrityFault> },
    /// The consistency join produced no matched pair at all.
    EmptyComparison,
}

impl Error for AlignErrors {}

impl Display for AlignErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignErrors::MalformedMapping {
                missing,
                bad_permutation,
            } => write!(
                f,
                "malformed mapping: missing (document, slot) entries {:?}, non-permutation documents {:?}",
                missing, bad_permutation
            ),
            AlignErrors::MappingCell {
                lineno,
                column,
                content,
            } => write!(
                f,
                "mapping line {} column {}: cannot parse cell {:?}",
                lineno, column, content
            ),
            AlignErrors::MissingShuffleEntry { document, slot } => write!(
                f,
                "no shuffle entry for document {} slot {}",
                document, slot
            ),
            AlignErrors::UnknownSystemIndex { document, index } => write!(
                f,
                "document {}: system index {} is outside the configured system set",
                document, index
            ),
            AlignErrors::RowLayout { lineno, width } => write!(
                f,
                "line {}: row width {} matches no known export layout",
                lineno, width
            ),
            AlignErrors::EmptyBwsCell { lineno, document } => write!(
                f,
                "line {}: empty best/worst cell for document {}",
                lineno, document
            ),
            AlignErrors::BadSlotDigit { lineno, content } => write!(
                f,
                "line {}: cell {:?} does not end with a slot digit 1..=4",
                lineno, content
            ),
            AlignErrors::BadScore { lineno, content } => write!(
                f,
                "line {}: cell {:?} is not an integer score",
                lineno, content
            ),
            AlignErrors::BadFileName { name } => write!(
                f,
                "file name {:?} does not follow the '<marker><start>-<end>' convention",
                name
            ),
            AlignErrors::DataIntegrity { faults } => {
                write!(f, "completeness violations:")?;
                for fault in faults {
                    write!(
                        f,
                        " [document {} {}: expected {} observed {}]",
                        fault.document, fault.subject, fault.expected, fault.observed
                    )?;
                }
                Ok(())
            }
            AlignErrors::EmptyComparison => {
                write!(f, "no (original, redo) pair could be matched")
            }
        }
    }
}
