//! Nanopore taxonomy tools: utilities around read filtering and taxonomic
//! classification of nanopore sequencing runs.
use std::error::Error;
use std::io;
use std::process;

use log::LevelFilter;
use structopt::StructOpt;

use cli::Command::*;

mod cli;
pub mod common;
pub mod errors;
pub mod pod5;
pub mod taxonomy;

use taxonomy::extract_classified_reads::{self, ExtractionOptions, Prompt};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = cli::Ntt::from_args();

    fern::Dispatch::new()
        .format(|out, message, _| out.finish(format_args!("{}", message)))
        .level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .chain(std::io::stderr())
        .apply()?;

    match args.cmd {
        Pod5FilterReadIds {
            input,
            output,
            adaptive_output,
            adaptive_reason,
        } => pod5::filter_read_ids::filter_read_ids(
            &input,
            &output,
            &adaptive_output,
            &adaptive_reason,
        )?,
        CombineBracken {
            files,
            names,
            output,
        } => taxonomy::combine_bracken::combine(&files, names.as_deref(), &output)?,
        ExtractClassifiedReads {
            experiment_dir,
            db,
            taxids,
            include_children,
            include_parents,
            exclude,
            fastq_output,
            seq_type,
            extract_tool,
        } => {
            let options = ExtractionOptions {
                experiment_dir,
                db,
                taxids,
                include_children,
                include_parents,
                exclude,
                fastq_output,
                seq_type,
                extract_tool,
            };
            let stdin = io::stdin();
            let mut prompt = Prompt::new(stdin.lock(), io::stdout());
            extract_classified_reads::extract_classified_reads(&options, &mut prompt)?;
        }
    }
    Ok(())
}
