use clap::Parser;
use snafu::ErrorCompat;

mod args;
mod pipeline;

use crate::args::Args;

fn main() {
    let args = Args::parse();
    if args.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let res = match (&args.original, &args.redo) {
        (Some(original), Some(redo)) => {
            let scheme = args.scheme.clone().unwrap_or_else(|| "likert".to_string());
            pipeline::run_consistency(original, redo, &scheme, args.metrics_out.clone())
        }
        (None, None) => match &args.config {
            Some(config) => {
                pipeline::run_alignment(config, args.out.clone(), args.reference.clone())
            }
            None => {
                eprintln!("a configuration file is required: crowdanno --config <path>");
                std::process::exit(2);
            }
        },
        _ => {
            eprintln!("--original and --redo must be provided together");
            std::process::exit(2);
        }
    };

    if let Err(e) = res {
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
