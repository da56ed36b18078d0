use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Could not open input file {}: {}", filename, source))]
    InputFileError {
        filename: String,
        source: std::io::Error,
    },

    #[snafu(display("Could not write output file {}: {}", filename, source))]
    OutputFileError {
        filename: String,
        source: std::io::Error,
    },

    #[snafu(display("Could not read tab separated record from {}: {}", filename, source))]
    CsvReadError {
        filename: String,
        source: csv::Error,
    },

    #[snafu(display("Could not write tab separated record: {}", source))]
    CsvWriteError { source: csv::Error },

    #[snafu(display("Failed to flush output: {}", source))]
    WriteFlushError { source: std::io::Error },

    #[snafu(display("Malformed record in {} at line {}: {}", filename, line, reason))]
    FormatError {
        filename: String,
        line: u64,
        reason: String,
    },

    #[snafu(display(
        "Taxonomy IDs not matching for species {}: sample {} reports {} but {} was seen first",
        taxon,
        sample,
        found,
        expected
    ))]
    TaxonomyMismatchError {
        taxon: String,
        expected: String,
        found: String,
        sample: String,
    },

    #[snafu(display(
        "Taxonomy level not matching between samples: sample {} reports level {} but {} was seen first",
        sample,
        found,
        expected
    ))]
    LevelMismatchError {
        expected: String,
        found: String,
        sample: String,
    },

    #[snafu(display(
        "Got {} sample names for {} input files. Please provide exactly one name per file.",
        names,
        files
    ))]
    SampleNameCountError { names: usize, files: usize },

    #[snafu(display(
        "Found duplicate sample name {}. Please make sure the provided sample names (or input file names) are unique.",
        name
    ))]
    DuplicateSampleNameError { name: String },

    #[snafu(display(
        "Column '{}' not found in {}. Available columns: {}",
        column,
        filename,
        available
    ))]
    MissingColumnError {
        column: String,
        filename: String,
        available: String,
    },

    #[snafu(display("The directory {} does not exist.", path))]
    MissingDirectoryError { path: String },

    #[snafu(display("Folder named {} not found within {}", db, path))]
    DatabaseNotFoundError { db: String, path: String },

    #[snafu(display("No .k2report files found in {}.", path))]
    NoReportsFoundError { path: String },

    #[snafu(display("No taxonomy IDs given for sample {}.", sample))]
    NoTaxidsError { sample: String },

    #[snafu(display("Invalid search pattern {}: {}", pattern, source))]
    GlobPatternError {
        pattern: String,
        source: glob::PatternError,
    },

    #[snafu(display("Could not access path while searching: {}", source))]
    GlobError { source: glob::GlobError },

    #[snafu(display("Could not read answer from terminal: {}", source))]
    PromptError { source: std::io::Error },

    #[snafu(display("Failed to run {}: {}", command, source))]
    ExternalToolCallError {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("Error executing command {} ({}): {}", command, status, stderr))]
    ExternalToolError {
        command: String,
        status: String,
        stderr: String,
    },
}
