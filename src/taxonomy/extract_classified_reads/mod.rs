//! Extract the reads classified as given taxa from the Kraken2 results of an
//! experiment, using `extract_kraken_reads.py` from KrakenTools.
//!
//! The experiment directory is expected to follow the layout of the
//! classification workflow:
//!
//! ```text
//! <experiment>/basecall/<sample>.fastq
//! <experiment>/analysis/kraken2/<sample>_masked.fastq
//! <experiment>/analysis/kraken2/<sample>_combined.k2report
//! <experiment>/analysis/kraken2/**/<db>/<sample>.k2report
//! <experiment>/analysis/kraken2/**/<db>/<sample>.k2
//! ```
//!
//! Every value not given on the command line is asked for interactively.
//!
//! ## Usage:
//!
//! ```bash
//! $ ntt extract-classified-reads --experiment-dir run1 --db pluspf --taxids 9606 --include-children
//! ```
//!
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use itertools::Itertools;
use log::{info, warn};
use snafu::{ensure, OptionExt, ResultExt};
use tempfile::NamedTempFile;

use crate::errors;

mod prompt;

pub use self::prompt::Prompt;

pub const DEFAULT_EXTRACT_TOOL: &str = "extract_kraken_reads.py";

/// Which reads of a sample to extract from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceType {
    Raw,
    Masked,
}

impl FromStr for SequenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(SequenceType::Raw),
            "masked" => Ok(SequenceType::Masked),
            other => Err(format!("unknown sequence type {} (expected raw or masked)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub experiment_dir: Option<PathBuf>,
    pub db: Option<String>,
    pub taxids: Vec<String>,
    pub include_children: bool,
    pub include_parents: bool,
    pub exclude: bool,
    pub fastq_output: bool,
    pub seq_type: Option<SequenceType>,
    /// Program to call, optionally followed by leading arguments
    /// (e.g. `python3 extract_kraken_reads.py`).
    pub extract_tool: String,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        ExtractionOptions {
            experiment_dir: None,
            db: None,
            taxids: Vec::new(),
            include_children: false,
            include_parents: false,
            exclude: false,
            fastq_output: false,
            seq_type: None,
            extract_tool: DEFAULT_EXTRACT_TOOL.to_owned(),
        }
    }
}

/// One call of the extraction tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub classifications: PathBuf,
    pub sequences: PathBuf,
    pub report: PathBuf,
    pub taxids: Vec<String>,
    pub output: PathBuf,
    pub include_children: bool,
    pub include_parents: bool,
    pub exclude: bool,
    pub fastq_output: bool,
}

impl Extraction {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-k".into(),
            self.classifications.clone().into(),
            "-s".into(),
            self.sequences.clone().into(),
            "-t".into(),
        ];
        args.extend(self.taxids.iter().map(OsString::from));
        args.push("-o".into());
        args.push(self.output.clone().into());
        args.push("-r".into());
        args.push(self.report.clone().into());
        let flags = [
            (self.include_children, "--include-children"),
            (self.include_parents, "--include-parents"),
            (self.exclude, "--exclude"),
            (self.fastq_output, "--fastq-output"),
        ];
        for &(set, flag) in flags.iter() {
            if set {
                args.push(OsString::from(flag));
            }
        }
        args
    }
}

/// Where the files of an experiment are, and what was chosen for all samples.
#[derive(Debug)]
struct Layout {
    experiment_dir: PathBuf,
    kraken2_dir: PathBuf,
    db_dir: Option<PathBuf>,
    seq_type: SequenceType,
    fastq_output: bool,
}

fn glob_paths(dir: &Path, relative_pattern: &str) -> errors::Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        relative_pattern
    );
    let mut paths = Vec::new();
    for entry in glob::glob(&pattern).context(errors::GlobPatternError {
        pattern: pattern.as_str(),
    })? {
        paths.push(entry.context(errors::GlobError)?);
    }
    Ok(paths)
}

/// First directory named `db` below `kraken2_dir`.
pub fn find_db_dir(kraken2_dir: &Path, db: &str) -> errors::Result<Option<PathBuf>> {
    let candidates = glob_paths(kraken2_dir, &format!("**/{}", glob::Pattern::escape(db)))?;
    Ok(candidates.into_iter().find(|path| path.is_dir()))
}

/// All Kraken2 reports below `dir`.
pub fn find_reports(dir: &Path) -> errors::Result<Vec<PathBuf>> {
    glob_paths(dir, "**/*.k2report")
}

/// Distinct, sorted sample names of the given reports. With `fold_combined`,
/// `<sample>_combined` reports count as `<sample>`.
pub fn sample_names(reports: &[PathBuf], fold_combined: bool) -> Vec<String> {
    reports
        .iter()
        .filter_map(|report| report.file_stem())
        .map(|stem| {
            let stem = stem.to_string_lossy();
            let sample = match stem.strip_suffix("_combined") {
                Some(sample) if fold_combined => sample,
                _ => &*stem,
            };
            sample.to_owned()
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Copy `report` without its comment lines into a temporary file.
pub fn strip_comments(report: &Path) -> errors::Result<NamedTempFile> {
    let filename = report.display().to_string();
    let reader = BufReader::new(File::open(report).context(errors::InputFileError {
        filename: filename.as_str(),
    })?);
    let mut tmp = NamedTempFile::new().context(errors::OutputFileError {
        filename: "temporary report",
    })?;
    {
        let mut writer = io::BufWriter::new(tmp.as_file_mut());
        for line in reader.lines() {
            let line = line.context(errors::InputFileError {
                filename: filename.as_str(),
            })?;
            if !line.starts_with('#') {
                writeln!(writer, "{}", line).context(errors::WriteFlushError)?;
            }
        }
        writer.flush().context(errors::WriteFlushError)?;
    }
    Ok(tmp)
}

/// Concatenate the classifications of `sample` from all databases into
/// `<kraken2_dir>/<sample>_combined.k2`.
fn combine_classifications(kraken2_dir: &Path, sample: &str) -> errors::Result<PathBuf> {
    let parts = glob_paths(
        kraken2_dir,
        &format!("**/{}.k2", glob::Pattern::escape(sample)),
    )?;
    let combined = kraken2_dir.join(format!("{}_combined.k2", sample));
    let filename = combined.display().to_string();
    let mut writer = io::BufWriter::new(File::create(&combined).context(
        errors::OutputFileError {
            filename: filename.as_str(),
        },
    )?);
    for part in &parts {
        let mut reader = File::open(part).context(errors::InputFileError {
            filename: part.display().to_string(),
        })?;
        io::copy(&mut reader, &mut writer).context(errors::OutputFileError {
            filename: filename.as_str(),
        })?;
    }
    writer.flush().context(errors::WriteFlushError)?;
    Ok(combined)
}

fn run_tool(tool: &str, args: &[OsString]) -> errors::Result<()> {
    let mut words = tool.split_whitespace();
    let program = words.next().unwrap_or_default();
    let command = tool
        .split_whitespace()
        .map(str::to_owned)
        .chain(args.iter().map(|arg| arg.to_string_lossy().into_owned()))
        .join(" ");
    info!("Running {}", command);

    let output = Command::new(program)
        .args(words)
        .args(args)
        .output()
        .context(errors::ExternalToolCallError {
            command: command.as_str(),
        })?;
    ensure!(
        output.status.success(),
        errors::ExternalToolError {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        }
    );
    Ok(())
}

fn extract_sample<R: BufRead, W: Write>(
    sample: &str,
    report: &Path,
    classifications: &Path,
    layout: &Layout,
    options: &ExtractionOptions,
    prompt: &mut Prompt<R, W>,
) -> errors::Result<PathBuf> {
    let sequences = match layout.seq_type {
        SequenceType::Raw => layout
            .experiment_dir
            .join("basecall")
            .join(format!("{}.fastq", sample)),
        SequenceType::Masked => layout.kraken2_dir.join(format!("{}_masked.fastq", sample)),
    };
    let stripped = strip_comments(report)?;

    let taxids: Vec<String> = if options.taxids.is_empty() {
        prompt
            .ask(
                "Input taxonomy ID[s] to extract or exclude (space-delimited)",
                None,
            )?
            .split_whitespace()
            .map(str::to_owned)
            .collect()
    } else {
        options.taxids.clone()
    };
    ensure!(!taxids.is_empty(), errors::NoTaxidsError { sample });
    let include_children = options.include_children
        || prompt.confirm("Include classified reads in levels below specified taxid(s)?")?;
    let include_parents = options.include_parents
        || (!include_children
            && prompt.confirm("Include classified reads in levels above specified taxid(s)?")?);

    let extension = if layout.fastq_output { "fastq" } else { "fasta" };
    let output = layout.kraken2_dir.join(format!(
        "{}-{}-extract.{}",
        sample,
        taxids.join("-"),
        extension
    ));
    let extraction = Extraction {
        classifications: classifications.to_owned(),
        sequences,
        report: stripped.path().to_owned(),
        taxids,
        output,
        include_children,
        include_parents,
        exclude: options.exclude,
        fastq_output: layout.fastq_output,
    };
    run_tool(&options.extract_tool, &extraction.args())?;

    let output = fs::canonicalize(&extraction.output).unwrap_or(extraction.output);
    info!("Extracted reads were saved at: {}", output.display());
    Ok(output)
}

fn process_sample<R: BufRead, W: Write>(
    sample: &str,
    layout: &Layout,
    options: &ExtractionOptions,
    prompt: &mut Prompt<R, W>,
) -> errors::Result<PathBuf> {
    match &layout.db_dir {
        Some(db_dir) => {
            let report = db_dir.join(format!("{}.k2report", sample));
            let classifications = db_dir.join(format!("{}.k2", sample));
            extract_sample(sample, &report, &classifications, layout, options, prompt)
        }
        None => {
            let report = layout
                .kraken2_dir
                .join(format!("{}_combined.k2report", sample));
            let classifications = combine_classifications(&layout.kraken2_dir, sample)?;
            let res = extract_sample(sample, &report, &classifications, layout, options, prompt);
            if let Err(err) = fs::remove_file(&classifications) {
                warn!("Could not remove {}: {}", classifications.display(), err);
            }
            res
        }
    }
}

/// Extract the reads of the chosen taxa for the chosen samples of an
/// experiment. Returns the paths of the extracted read files.
pub fn extract_classified_reads<R: BufRead, W: Write>(
    options: &ExtractionOptions,
    prompt: &mut Prompt<R, W>,
) -> errors::Result<Vec<PathBuf>> {
    info!("This tool assumes classification has been run, or the folder structure is kept.");

    let experiment_dir = match &options.experiment_dir {
        Some(dir) => dir.clone(),
        None => PathBuf::from(prompt.ask(
            "Input the Experiment/Sample directory you wish to process",
            None,
        )?),
    };
    let seq_type = match options.seq_type {
        Some(seq_type) => seq_type,
        None => prompt
            .ask(
                "Do you wish to extract raw or masked reads for all samples? (raw/masked)",
                None,
            )?
            .parse()
            .unwrap_or_else(|_| {
                warn!("Invalid option. Extracting from raw file as default.");
                SequenceType::Raw
            }),
    };
    let fastq_output =
        options.fastq_output || prompt.confirm("Do you want FASTQ output for all samples?")?;

    let kraken2_dir = experiment_dir.join("analysis").join("kraken2");
    ensure!(
        kraken2_dir.is_dir(),
        errors::MissingDirectoryError {
            path: kraken2_dir.display().to_string(),
        }
    );

    let db = match &options.db {
        Some(db) => db.clone(),
        None => prompt.ask(
            "To only extract reads based on classifications from a single database, please input folder name (leave blank if not)",
            None,
        )?,
    };
    let db_dir = if db.is_empty() {
        None
    } else {
        Some(
            find_db_dir(&kraken2_dir, &db)?.context(errors::DatabaseNotFoundError {
                db: db.as_str(),
                path: kraken2_dir.display().to_string(),
            })?,
        )
    };

    let search_dir = db_dir.as_deref().unwrap_or(&kraken2_dir);
    let reports = find_reports(search_dir)?;
    ensure!(
        !reports.is_empty(),
        errors::NoReportsFoundError {
            path: search_dir.display().to_string(),
        }
    );
    let mut samples = sample_names(&reports, db_dir.is_none());
    if samples.len() > 1 {
        info!("Found multiple samples: {}", samples.join(", "));
        if !prompt.confirm("Do you want to process all samples?")? {
            let sample = prompt.ask(
                "Which sample do you want to process?",
                Some(samples[0].as_str()),
            )?;
            samples = vec![sample];
        }
    }

    let layout = Layout {
        experiment_dir,
        kraken2_dir,
        db_dir,
        seq_type,
        fastq_output,
    };
    let mut outputs = Vec::new();
    for sample in &samples {
        info!("Processing sample: {}", sample);
        outputs.push(process_sample(sample, &layout, options, prompt)?);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REPORT: &str = "# Kraken2 report\n# database: test\n 50.00\t10\t10\tS\t9606\t  Homo sapiens\n";

    /// Experiment with sample s1 classified against two databases and a
    /// combined report.
    fn experiment() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let kraken2 = dir.path().join("analysis").join("kraken2");
        for db in &["dbA", "nested/dbB"] {
            let db_dir = kraken2.join(db);
            fs::create_dir_all(&db_dir).unwrap();
            fs::write(db_dir.join("s1.k2report"), REPORT).unwrap();
            fs::write(db_dir.join("s1.k2"), format!("C\tread_{}\t9606\t100\t9606:66\n", db.len())).unwrap();
        }
        fs::write(kraken2.join("s1_combined.k2report"), REPORT).unwrap();
        fs::create_dir_all(dir.path().join("basecall")).unwrap();
        fs::write(dir.path().join("basecall").join("s1.fastq"), "@read\nACGT\n+\nIIII\n").unwrap();
        dir
    }

    /// Tool that records its arguments and the report it was given next to
    /// the script.
    fn recording_tool(dir: &Path) -> String {
        let script = dir.join("record.sh");
        fs::write(
            &script,
            "echo \"$@\" > \"$(dirname \"$0\")/args.txt\"\n\
             while [ $# -gt 0 ]; do\n\
             if [ \"$1\" = \"-r\" ]; then cat \"$2\" > \"$(dirname \"$0\")/report.txt\"; fi\n\
             if [ \"$1\" = \"-k\" ]; then cat \"$2\" > \"$(dirname \"$0\")/k2.txt\"; fi\n\
             shift\n\
             done\n",
        )
        .unwrap();
        format!("sh {}", script.display())
    }

    #[test]
    fn test_extraction_args() {
        let extraction = Extraction {
            classifications: PathBuf::from("s1.k2"),
            sequences: PathBuf::from("s1.fastq"),
            report: PathBuf::from("s1.k2report"),
            taxids: vec!["9606".to_owned(), "562".to_owned()],
            output: PathBuf::from("s1-9606-562-extract.fasta"),
            include_children: true,
            include_parents: false,
            exclude: true,
            fastq_output: false,
        };
        let args: Vec<_> = extraction
            .args()
            .into_iter()
            .map(|arg| arg.into_string().unwrap())
            .collect();
        assert_eq!(
            args.join(" "),
            "-k s1.k2 -s s1.fastq -t 9606 562 -o s1-9606-562-extract.fasta -r s1.k2report --include-children --exclude"
        );
    }

    #[test]
    fn test_sequence_type() {
        assert_eq!("RAW".parse::<SequenceType>(), Ok(SequenceType::Raw));
        assert_eq!("masked".parse::<SequenceType>(), Ok(SequenceType::Masked));
        assert!("trimmed".parse::<SequenceType>().is_err());
    }

    #[test]
    fn test_sample_names() {
        let reports = vec![
            PathBuf::from("k/dbB/s2.k2report"),
            PathBuf::from("k/dbA/s1.k2report"),
            PathBuf::from("k/s1_combined.k2report"),
            PathBuf::from("k/dbA/s2.k2report"),
        ];
        assert_eq!(sample_names(&reports, true), vec!["s1", "s2"]);
        assert_eq!(sample_names(&reports, false), vec!["s1", "s1_combined", "s2"]);
    }

    #[test]
    fn test_strip_comments() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("s1.k2report");
        fs::write(&report, REPORT).unwrap();
        let stripped = strip_comments(&report).unwrap();
        assert_eq!(
            fs::read_to_string(stripped.path()).unwrap(),
            " 50.00\t10\t10\tS\t9606\t  Homo sapiens\n"
        );
    }

    #[test]
    fn test_find_db_dir() {
        let dir = experiment();
        let kraken2 = dir.path().join("analysis").join("kraken2");
        assert_eq!(find_db_dir(&kraken2, "dbA").unwrap(), Some(kraken2.join("dbA")));
        assert_eq!(
            find_db_dir(&kraken2, "dbB").unwrap(),
            Some(kraken2.join("nested").join("dbB"))
        );
        assert_eq!(find_db_dir(&kraken2, "dbC").unwrap(), None);
        assert_eq!(find_reports(&kraken2).unwrap().len(), 3);
    }

    #[test]
    fn test_extract_single_database() {
        let dir = experiment();
        let options = ExtractionOptions {
            experiment_dir: Some(dir.path().to_owned()),
            db: Some("dbA".to_owned()),
            taxids: vec!["9606".to_owned()],
            seq_type: Some(SequenceType::Raw),
            extract_tool: recording_tool(dir.path()),
            ..Default::default()
        };
        // FASTQ output, include children
        let mut prompt = Prompt::new("yes\nyes\n".as_bytes(), Vec::new());
        let outputs = extract_classified_reads(&options, &mut prompt).unwrap();

        let kraken2 = dir.path().join("analysis").join("kraken2");
        assert_eq!(outputs, vec![kraken2.join("s1-9606-extract.fastq")]);
        let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        assert!(args.starts_with(&format!(
            "-k {} -s {} -t 9606 -o {} -r ",
            kraken2.join("dbA").join("s1.k2").display(),
            dir.path().join("basecall").join("s1.fastq").display(),
            kraken2.join("s1-9606-extract.fastq").display(),
        )));
        assert!(args.trim_end().ends_with("--include-children --fastq-output"));
        assert!(!args.contains("--include-parents"));
        assert_eq!(
            fs::read_to_string(dir.path().join("report.txt")).unwrap(),
            " 50.00\t10\t10\tS\t9606\t  Homo sapiens\n"
        );
    }

    #[test]
    fn test_extract_all_databases() {
        let dir = experiment();
        let options = ExtractionOptions {
            experiment_dir: Some(dir.path().to_owned()),
            extract_tool: recording_tool(dir.path()),
            ..Default::default()
        };
        // masked reads, FASTA output, all databases, taxids, no children, parents
        let mut prompt = Prompt::new("masked\nno\n\n9606 562\nno\nyes\n".as_bytes(), Vec::new());
        let outputs = extract_classified_reads(&options, &mut prompt).unwrap();

        let kraken2 = dir.path().join("analysis").join("kraken2");
        assert_eq!(outputs, vec![kraken2.join("s1-9606-562-extract.fasta")]);
        let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        assert!(args.starts_with(&format!(
            "-k {} -s {} -t 9606 562 ",
            kraken2.join("s1_combined.k2").display(),
            kraken2.join("s1_masked.fastq").display(),
        )));
        assert!(args.trim_end().ends_with("--include-parents"));

        let k2 = fs::read_to_string(dir.path().join("k2.txt")).unwrap();
        assert_eq!(k2.lines().count(), 2);
        assert!(!kraken2.join("s1_combined.k2").exists());
    }

    #[test]
    fn test_failing_tool() {
        let dir = experiment();
        let options = ExtractionOptions {
            experiment_dir: Some(dir.path().to_owned()),
            db: Some("dbA".to_owned()),
            taxids: vec!["9606".to_owned()],
            include_children: true,
            fastq_output: true,
            seq_type: Some(SequenceType::Raw),
            extract_tool: "false".to_owned(),
            ..Default::default()
        };
        let mut prompt = Prompt::new("".as_bytes(), Vec::new());
        assert!(matches!(
            extract_classified_reads(&options, &mut prompt),
            Err(errors::Error::ExternalToolError { .. })
        ));
    }

    #[test]
    fn test_tool_error_kept_when_cleanup_fails() {
        let dir = experiment();
        // removes the combined classifications passed with -k, then fails
        let script = dir.path().join("fail.sh");
        fs::write(&script, "rm \"$2\"\nexit 3\n").unwrap();
        let options = ExtractionOptions {
            experiment_dir: Some(dir.path().to_owned()),
            taxids: vec!["9606".to_owned()],
            include_children: true,
            fastq_output: true,
            seq_type: Some(SequenceType::Raw),
            extract_tool: format!("sh {}", script.display()),
            ..Default::default()
        };
        // all databases
        let mut prompt = Prompt::new("\nno\nno\n".as_bytes(), Vec::new());
        assert!(matches!(
            extract_classified_reads(&options, &mut prompt),
            Err(errors::Error::ExternalToolError { .. })
        ));
        let kraken2 = dir.path().join("analysis").join("kraken2");
        assert!(!kraken2.join("s1_combined.k2").exists());
    }

    #[test]
    fn test_missing_layout() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExtractionOptions {
            experiment_dir: Some(dir.path().to_owned()),
            seq_type: Some(SequenceType::Raw),
            fastq_output: true,
            ..Default::default()
        };
        let mut prompt = Prompt::new("".as_bytes(), Vec::new());
        assert!(matches!(
            extract_classified_reads(&options, &mut prompt),
            Err(errors::Error::MissingDirectoryError { .. })
        ));

        let dir = experiment();
        let options = ExtractionOptions {
            experiment_dir: Some(dir.path().to_owned()),
            db: Some("dbC".to_owned()),
            seq_type: Some(SequenceType::Raw),
            fastq_output: true,
            ..Default::default()
        };
        assert!(matches!(
            extract_classified_reads(&options, &mut prompt),
            Err(errors::Error::DatabaseNotFoundError { .. })
        ));
    }
}
