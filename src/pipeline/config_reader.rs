use crate::pipeline::*;

use serde::{Deserialize, Serialize};

/// Description of one alignment run. All paths are relative to the
/// configuration file.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    #[serde(rename = "corpusName")]
    pub corpus_name: String,
    /// "likert" or "bws".
    pub scheme: String,
    #[serde(rename = "annotationDirectory")]
    pub annotation_directory: String,
    #[serde(rename = "mappingFile")]
    pub mapping_file: String,
    #[serde(rename = "outputPath")]
    pub output_path: String,
    /// Where the normalized facts are dumped for a later consistency run.
    #[serde(rename = "factsPath")]
    pub facts_path: Option<String>,
    #[serde(rename = "documentCount")]
    pub document_count: Option<u32>,
    #[serde(rename = "chunkSize")]
    pub chunk_size: Option<u32>,
    #[serde(rename = "annotatorsPerChunk")]
    pub annotators_per_chunk: Option<usize>,
    /// System names in output order; the mapping file indexes into this list.
    pub systems: Vec<String>,
    /// Overrides the marker derived from the scheme.
    #[serde(rename = "fileMarker")]
    pub file_marker: Option<String>,
}

impl AlignmentConfig {
    pub fn scheme(&self) -> RunResult<Scheme> {
        parse_scheme(self.scheme.as_str())
    }

    pub fn chunking_rules(&self) -> ChunkingRules {
        let defaults = ChunkingRules::DEFAULT_RULES;
        ChunkingRules {
            document_count: self.document_count.unwrap_or(defaults.document_count),
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            annotators_per_chunk: self
                .annotators_per_chunk
                .unwrap_or(defaults.annotators_per_chunk),
        }
    }

    pub fn system_set(&self) -> RunResult<SystemSet> {
        if self.systems.is_empty() {
            whatever!("the configuration must name at least one system");
        }
        Ok(SystemSet::new(&self.systems))
    }

    pub fn marker(&self, scheme: Scheme) -> String {
        match &self.file_marker {
            Some(m) => m.clone(),
            None => scheme.default_marker().to_string(),
        }
    }
}

pub fn parse_scheme(name: &str) -> RunResult<Scheme> {
    match name {
        "likert" => Ok(Scheme::Likert),
        "bws" => Ok(Scheme::Bws),
        x => whatever!("Cannot use scheme {:?} (expected \"likert\" or \"bws\")", x),
    }
}

pub fn read_config(path: &str) -> RunResult<AlignmentConfig> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}
