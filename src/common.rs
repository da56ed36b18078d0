//! Helpers shared by the subcommands: tab separated readers and writers,
//! all-or-nothing output files and log time stamps.
use std::fs::File;
use std::io;
use std::path::Path;

use chrono::Utc;
use snafu::ResultExt;
use tempfile::NamedTempFile;

use crate::errors;

/// Reader for a tab separated table with a header line.
///
/// Quotes carry no meaning in the tables we consume and rows are allowed to
/// have varying field counts, so that callers can report malformed rows with
/// their own error. Fields are trimmed. Records end at `\n` only, so that
/// record positions keep the right line numbers for CRLF files; the trailing
/// `\r` is removed by trimming.
pub fn tsv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .terminator(csv::Terminator::Any(b'\n'))
        .trim(csv::Trim::All)
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(reader)
}

pub fn tsv_writer<W: io::Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer)
}

/// File name of the given path, falling back to the whole path.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Current UTC time as used in the start and end log lines.
pub fn timestamp() -> String {
    Utc::now().format("%m-%d-%Y %H:%M:%S").to_string()
}

/// Temporary file created with the mode of a plain `File::create`, so that the
/// umask decides its permissions once persisted.
fn temp_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

/// Write `path` through a temporary file in the same directory that only
/// replaces `path` once `write` succeeded.
pub fn write_atomically<F>(path: &Path, write: F) -> errors::Result<()>
where
    F: FnOnce(&mut File) -> errors::Result<()>,
{
    let filename = path.display().to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = temp_file_in(dir).context(errors::OutputFileError {
        filename: filename.as_str(),
    })?;
    write(tmp.as_file_mut())?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .context(errors::OutputFileError { filename })?;
    Ok(())
}
