use clap::Parser;

/// This is an aggregation and cross-validation program for crowdsourced
/// summary-annotation campaigns.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing an alignment run: corpus name, scheme,
    /// annotation directory, shuffle-order mapping file, output paths, campaign
    /// shape and the ordered list of system names.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference copy of the expected flat output. If provided,
    /// crowdanno will check that the produced output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path or empty) If specified, overrides the output path given in the
    /// configuration file.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) The facts dump of the original annotation pass. Requires --redo;
    /// switches to the consistency-comparison mode.
    #[clap(long, value_parser)]
    pub original: Option<String>,

    /// (file path) The facts dump of the redo annotation pass. Requires --original.
    #[clap(long, value_parser)]
    pub redo: Option<String>,

    /// (default likert) The scheme of the facts dumps compared in consistency mode:
    /// "likert" or "bws".
    #[clap(long, value_parser)]
    pub scheme: Option<String>,

    /// (file path or empty) Where the per-worker consistency metrics are written,
    /// in JSON format.
    #[clap(long, value_parser)]
    pub metrics_out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
