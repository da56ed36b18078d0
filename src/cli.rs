use std::path::PathBuf;
use structopt::StructOpt;

use crate::pod5::filter_read_ids::ADAPTIVE_SAMPLING_END_REASON;
use crate::taxonomy::extract_classified_reads::{SequenceType, DEFAULT_EXTRACT_TOOL};

#[derive(StructOpt)]
#[structopt(
    about = "Command line utilities for a nanopore sequencing and taxonomic classification workflow.",
    name = "ntt"
)]
pub(crate) struct Ntt {
    #[structopt(long, short, help = "Verbose output.")]
    pub(crate) verbose: bool,

    #[structopt(subcommand)]
    pub(crate) cmd: Command,
}

#[derive(StructOpt)]
pub(crate) enum Command {
    /// Split the read IDs of a `pod5 view` table (tab separated) by end reason.
    ///
    /// Read IDs of reads rejected by adaptive sampling are written to the
    /// adaptive file, all others to the output file. Files that would be
    /// empty are not created.
    ///
    /// Example:
    /// ntt pod5-filter-read-ids view.tsv basecall_ids.txt adaptive_ids.txt
    Pod5FilterReadIds {
        /// Table written by `pod5 view`, with `read_id` and `end_reason` columns.
        #[structopt(parse(from_os_str))]
        input: PathBuf,

        /// File for the read IDs to basecall.
        #[structopt(parse(from_os_str))]
        output: PathBuf,

        /// File for the adaptive sampling read IDs.
        #[structopt(parse(from_os_str))]
        adaptive_output: PathBuf,

        /// End reason marking reads rejected by adaptive sampling.
        #[structopt(long, default_value = ADAPTIVE_SAMPLING_END_REASON)]
        adaptive_reason: String,
    },

    /// Combine multiple Bracken output files into one table with per sample
    /// read counts and fractions, plus totals over all samples.
    ///
    /// Example:
    /// ntt combine-bracken --files A.bracken B.bracken --names s1,s2 -o combined.tsv
    CombineBracken {
        /// Bracken output files to combine.
        #[structopt(long, required = true, min_values = 1, parse(from_os_str))]
        files: Vec<PathBuf>,

        /// Names for each input file, used in the column headers of the output
        /// (separated by commas). Defaults to the input file names.
        #[structopt(long)]
        names: Option<String>,

        /// Output file with the combined Bracken results.
        #[structopt(long, short, parse(from_os_str))]
        output: PathBuf,
    },

    /// Extract Kraken2 classified reads of an experiment with KrakenTools'
    /// extract_kraken_reads.py. Values not given are asked for interactively.
    ///
    /// Example:
    /// ntt extract-classified-reads --experiment-dir run1 --db pluspf --taxids 9606 562
    ExtractClassifiedReads {
        /// Directory of the corresponding experiment/sample folder.
        #[structopt(long, parse(from_os_str))]
        experiment_dir: Option<PathBuf>,

        /// Single database classification to process.
        #[structopt(long)]
        db: Option<String>,

        /// Taxonomy ID(s) of the reads to extract.
        #[structopt(long, value_name = "TAXID")]
        taxids: Vec<String>,

        /// Include reads classified more specifically than the given taxids.
        #[structopt(long)]
        include_children: bool,

        /// Include reads classified at parent levels of the given taxids.
        #[structopt(long)]
        include_parents: bool,

        /// Instead of finding matching reads, find all reads NOT matching the given taxids.
        #[structopt(long)]
        exclude: bool,

        /// Write FASTQ instead of FASTA (requires FASTQ input).
        #[structopt(long)]
        fastq_output: bool,

        /// Extract from the raw or the masked reads.
        #[structopt(long, possible_values = &["raw", "masked"], case_insensitive = true)]
        seq_type: Option<SequenceType>,

        /// Extraction command to run.
        #[structopt(long, default_value = DEFAULT_EXTRACT_TOOL)]
        extract_tool: String,
    },
}
