//! Split the read IDs of a `pod5 view` table by their end reason.
//!
//! Reads rejected by adaptive sampling (end reason
//! `data_service_unblock_mux_change`) are written to one list, all other
//! reads, which still need basecalling, to another.
//!
//! ## Usage:
//!
//! ```bash
//! $ ntt pod5-filter-read-ids view.tsv basecall_ids.txt adaptive_ids.txt
//! ```
//!
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use itertools::Itertools;
use log::info;
use snafu::{OptionExt, ResultExt};

use crate::common;
use crate::errors;

pub const ADAPTIVE_SAMPLING_END_REASON: &str = "data_service_unblock_mux_change";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReadIdSplit {
    pub basecall: Vec<String>,
    pub adaptive: Vec<String>,
}

fn column(headers: &csv::StringRecord, name: &str, filename: &str) -> errors::Result<usize> {
    headers
        .iter()
        .position(|title| title.trim() == name)
        .context(errors::MissingColumnError {
            column: name,
            filename,
            available: headers.iter().map(str::trim).join(", "),
        })
}

/// Sort the read IDs of a tab separated table into those with the given
/// adaptive sampling end reason and all others, keeping their order.
pub fn split_read_ids<R: io::Read>(
    reader: R,
    filename: &str,
    adaptive_reason: &str,
) -> errors::Result<ReadIdSplit> {
    let mut rdr = common::tsv_reader(reader);
    let headers = rdr
        .headers()
        .context(errors::CsvReadError { filename })?
        .clone();
    let end_reason = column(&headers, "end_reason", filename)?;
    let read_id = column(&headers, "read_id", filename)?;

    let mut split = ReadIdSplit::default();
    for res in rdr.records() {
        let record = res.context(errors::CsvReadError { filename })?;
        let (id, reason) = match (record.get(read_id), record.get(end_reason)) {
            (Some(id), Some(reason)) => (id, reason),
            _ => {
                return errors::FormatError {
                    filename,
                    line: record.position().map_or(0, |pos| pos.line()),
                    reason: format!("expected {} fields, found {}", headers.len(), record.len()),
                }
                .fail()
            }
        };
        if reason.trim() == adaptive_reason {
            split.adaptive.push(id.to_owned());
        } else {
            split.basecall.push(id.to_owned());
        }
    }
    Ok(split)
}

fn write_ids(path: &Path, ids: &[String]) -> errors::Result<()> {
    common::write_atomically(path, |file| {
        let mut writer = io::BufWriter::new(file);
        for id in ids {
            writeln!(writer, "{}", id).context(errors::OutputFileError {
                filename: path.display().to_string(),
            })?;
        }
        writer.flush().context(errors::WriteFlushError)
    })
}

/// Write the read IDs still to be basecalled to `output` and those rejected
/// by adaptive sampling to `adaptive_output`. An output is only created if it
/// receives at least one read ID.
pub fn filter_read_ids(
    input: &Path,
    output: &Path,
    adaptive_output: &Path,
    adaptive_reason: &str,
) -> errors::Result<()> {
    let filename = input.display().to_string();
    let file = File::open(input).context(errors::InputFileError {
        filename: filename.as_str(),
    })?;
    let split = split_read_ids(io::BufReader::new(file), &filename, adaptive_reason)?;

    if split.basecall.is_empty() {
        info!("No read_ids to be basecalled found.");
    } else {
        write_ids(output, &split.basecall)?;
        info!(
            "{} read_ids to be basecalled saved to {}",
            split.basecall.len(),
            output.display()
        );
    }

    if split.adaptive.is_empty() {
        info!("No adaptive sampling read_ids found.");
    } else {
        write_ids(adaptive_output, &split.adaptive)?;
        info!(
            "{} adaptive sampling read_ids saved to {}",
            split.adaptive.len(),
            adaptive_output.display()
        );
    }
    Ok(())
}
