//! Combine the abundance estimates of several Bracken reports into one table.
//!
//! Every input is a tab separated Bracken output with a header line and the
//! columns `name`, `taxonomy_id`, `taxonomy_lvl`, `kraken_assigned_reads`,
//! `added_reads`, `new_est_reads` and `fraction_total_reads`.
//! The combined table holds, for each taxon, the estimated reads and their
//! fraction per sample, plus the total over all samples.
//!
//! ## Usage:
//!
//! ```bash
//! $ ntt combine-bracken --files A.bracken B.bracken --names s1,s2 -o combined.tsv
//! ```
//!
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::de::IgnoredAny;
use serde::Deserialize;
use snafu::{ensure, ResultExt};

use crate::common;
use crate::errors;

const BRACKEN_COLUMNS: usize = 7;

#[derive(Debug, Deserialize)]
struct BrackenRecord {
    name: String,
    taxonomy_id: String,
    taxonomy_lvl: String,
    _kraken_assigned_reads: IgnoredAny,
    _added_reads: IgnoredAny,
    new_est_reads: u64,
    _fraction_total_reads: IgnoredAny,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub total_reads: u64,
}

/// A taxon together with its estimated reads in each sample, indexed like the
/// samples of the combiner.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonEntry {
    pub name: String,
    pub taxonomy_id: String,
    pub counts: Vec<u64>,
}

/// Accumulates the rows of several Bracken reports.
///
/// The first taxonomy ID seen for a taxon name and the first taxonomy level
/// seen at all are canonical; any later row contradicting them is rejected.
#[derive(Debug, Default)]
pub struct BrackenCombiner {
    samples: Vec<Sample>,
    taxa: Vec<TaxonEntry>,
    index: HashMap<String, usize>,
    level: Option<String>,
}

impl BrackenCombiner {
    pub fn new<I, S>(sample_names: I) -> errors::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut samples: Vec<Sample> = Vec::new();
        for name in sample_names {
            let name = name.into();
            ensure!(
                samples.iter().all(|sample| sample.name != name),
                errors::DuplicateSampleNameError { name }
            );
            samples.push(Sample {
                name,
                total_reads: 0,
            });
        }
        Ok(BrackenCombiner {
            samples,
            ..Default::default()
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Add the estimated reads of one taxon to the sample at index `sample`.
    pub fn add_record(
        &mut self,
        sample: usize,
        name: &str,
        taxonomy_id: &str,
        taxonomy_lvl: &str,
        est_reads: u64,
    ) -> errors::Result<()> {
        let known = self.index.get(name).copied();
        if let Some(taxon) = known {
            let expected_id = &self.taxa[taxon].taxonomy_id;
            ensure!(
                expected_id == taxonomy_id,
                errors::TaxonomyMismatchError {
                    taxon: name,
                    expected: expected_id.as_str(),
                    found: taxonomy_id,
                    sample: self.samples[sample].name.as_str(),
                }
            );
        }

        let expected_lvl = self
            .level
            .get_or_insert_with(|| taxonomy_lvl.to_owned());
        ensure!(
            expected_lvl.as_str() == taxonomy_lvl,
            errors::LevelMismatchError {
                expected: expected_lvl.as_str(),
                found: taxonomy_lvl,
                sample: self.samples[sample].name.as_str(),
            }
        );

        let taxon = match known {
            Some(taxon) => taxon,
            None => {
                self.taxa.push(TaxonEntry {
                    name: name.to_owned(),
                    taxonomy_id: taxonomy_id.to_owned(),
                    counts: vec![0; self.samples.len()],
                });
                self.index.insert(name.to_owned(), self.taxa.len() - 1);
                self.taxa.len() - 1
            }
        };

        self.taxa[taxon].counts[sample] += est_reads;
        self.samples[sample].total_reads += est_reads;
        debug!(
            "{}: {} ({}) += {}",
            self.samples[sample].name, name, taxonomy_id, est_reads
        );
        Ok(())
    }

    /// Read all data rows of one Bracken report into the sample at index
    /// `sample`. `filename` is only used for error messages.
    pub fn read_report<R: io::Read>(
        &mut self,
        sample: usize,
        reader: R,
        filename: &str,
    ) -> errors::Result<()> {
        let mut rdr = common::tsv_reader(reader);
        let mut record = csv::StringRecord::new();
        while rdr
            .read_record(&mut record)
            .context(errors::CsvReadError { filename })?
        {
            let line = record.position().map_or(0, |pos| pos.line());
            ensure!(
                record.len() == BRACKEN_COLUMNS,
                errors::FormatError {
                    filename,
                    line,
                    reason: format!(
                        "expected {} tab separated fields, found {}",
                        BRACKEN_COLUMNS,
                        record.len()
                    ),
                }
            );
            let row: BrackenRecord = match record.deserialize(None) {
                Ok(row) => row,
                Err(_) => {
                    return errors::FormatError {
                        filename,
                        line,
                        reason: format!(
                            "new_est_reads '{}' is not a non-negative integer",
                            &record[5]
                        ),
                    }
                    .fail()
                }
            };
            self.add_record(
                sample,
                &row.name,
                &row.taxonomy_id,
                &row.taxonomy_lvl,
                row.new_est_reads,
            )?;
        }
        Ok(())
    }

    pub fn finish(self) -> CombinedReport {
        CombinedReport {
            samples: self.samples,
            taxa: self.taxa,
            level: self.level.unwrap_or_default(),
        }
    }
}

/// One output row of the combined report.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow<'a> {
    pub name: &'a str,
    pub taxonomy_id: &'a str,
    /// Count and fraction per sample, in sample order.
    pub samples: Vec<(u64, f64)>,
    pub total_num: u64,
    pub total_frac: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedReport {
    samples: Vec<Sample>,
    taxa: Vec<TaxonEntry>,
    level: String,
}

impl CombinedReport {
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Sum of the estimated reads over all samples.
    pub fn total_reads(&self) -> u64 {
        self.samples.iter().map(|sample| sample.total_reads).sum()
    }

    /// Rows in the order their taxon was first seen.
    pub fn rows(&self) -> impl Iterator<Item = CombinedRow<'_>> + '_ {
        let total_reads = self.total_reads();
        self.taxa.iter().map(move |taxon| {
            let samples = taxon
                .counts
                .iter()
                .zip(&self.samples)
                .map(|(&count, sample)| (count, fraction(count, sample.total_reads)))
                .collect();
            let total_num = taxon.counts.iter().sum();
            CombinedRow {
                name: &taxon.name,
                taxonomy_id: &taxon.taxonomy_id,
                samples,
                total_num,
                total_frac: fraction(total_num, total_reads),
            }
        })
    }

    pub fn write<W: io::Write>(&self, writer: W) -> errors::Result<()> {
        let mut wtr = common::tsv_writer(writer);

        let mut header = vec![
            "name".to_owned(),
            "taxonomy_id".to_owned(),
            "taxonomy_lvl".to_owned(),
        ];
        for sample in &self.samples {
            header.push(format!("{}_num", sample.name));
            header.push(format!("{}_frac", sample.name));
        }
        header.push("total_num".to_owned());
        header.push("total_frac".to_owned());
        wtr.write_record(&header).context(errors::CsvWriteError)?;

        for row in self.rows() {
            let mut fields = vec![
                row.name.to_owned(),
                row.taxonomy_id.to_owned(),
                self.level.clone(),
            ];
            for (count, frac) in row.samples {
                fields.push(count.to_string());
                fields.push(format!("{:.5}", frac));
            }
            fields.push(row.total_num.to_string());
            fields.push(format!("{:.5}", row.total_frac));
            wtr.write_record(&fields).context(errors::CsvWriteError)?;
        }
        wtr.flush().context(errors::WriteFlushError)?;
        Ok(())
    }
}

/// `count / total`, defined as 0 for an empty total.
fn fraction(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Display names of the samples: the comma separated `names` if given,
/// otherwise the file names of the inputs.
pub fn sample_names(files: &[PathBuf], names: Option<&str>) -> errors::Result<Vec<String>> {
    match names.map(str::trim).filter(|names| !names.is_empty()) {
        Some(names) => {
            let names: Vec<String> = names.split(',').map(|n| n.trim().to_owned()).collect();
            ensure!(
                names.len() == files.len(),
                errors::SampleNameCountError {
                    names: names.len(),
                    files: files.len(),
                }
            );
            Ok(names)
        }
        None => Ok(files.iter().map(|f| common::base_name(f)).collect()),
    }
}

/// Combine the Bracken reports at `files` and write the table to `output`.
/// Nothing is written unless all inputs were read and validated.
pub fn combine(files: &[PathBuf], names: Option<&str>, output: &Path) -> errors::Result<()> {
    info!("PROGRAM START TIME: {}", common::timestamp());

    let mut combiner = BrackenCombiner::new(sample_names(files, names)?)?;
    for (i, path) in files.iter().enumerate() {
        let filename = path.display().to_string();
        info!(
            "Processing output file {} :: sample {}",
            filename,
            combiner.samples()[i].name
        );
        let file = File::open(path).context(errors::InputFileError {
            filename: filename.as_str(),
        })?;
        combiner.read_report(i, io::BufReader::new(file), &filename)?;
    }

    let report = combiner.finish();
    common::write_atomically(output, |file| report.write(io::BufWriter::new(file)))?;
    info!(
        "Combined {} taxa from {} samples into {}",
        report.rows().count(),
        report.samples().len(),
        output.display()
    );

    info!("PROGRAM END TIME: {}", common::timestamp());
    Ok(())
}
