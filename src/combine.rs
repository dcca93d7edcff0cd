//! CSV combination for one directory.
//!
//! Parsing contract: every source blob is read as plain CSV records (no header
//! interpretation, record lengths may vary). Record 0 is the header and records
//! 1.. are data. The first source file contributes its header once; every other
//! file's first record is dropped. Blank lines count as empty records and are
//! written back as empty lines, so a file holding only a line break has an
//! empty header and no data. Output is RFC 4180 CSV with CRLF terminators.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CombineError;
use crate::partition::ensure_trailing_slash;
use crate::storage::BlobStore;

pub const COMBINED_FILE_NAME: &str = "combined_data.csv";
pub const CSV_SUFFIX: &str = ".csv";

pub type Result<T> = std::result::Result<T, CombineError>;

/// What to do with a `.csv` blob that contains no records at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyFilePolicy {
    /// Fail the whole directory; nothing is uploaded.
    #[default]
    Abort,
    /// Log and leave the file out.
    Skip,
}

impl std::fmt::Display for EmptyFilePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyFilePolicy::Abort => write!(f, "abort"),
            EmptyFilePolicy::Skip => write!(f, "skip"),
        }
    }
}

impl std::str::FromStr for EmptyFilePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(EmptyFilePolicy::Abort),
            "skip" => Ok(EmptyFilePolicy::Skip),
            _ => anyhow::bail!("Unsupported empty file policy: {}. Supported: abort, skip", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineOptions {
    /// File name of the merged blob inside each directory.
    pub output_name: String,
    /// Leave a previous merged blob out of the inputs. Off by default, which
    /// folds the last run's output back into the next one.
    pub exclude_output: bool,
    pub empty_file_policy: EmptyFilePolicy,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            output_name: COMBINED_FILE_NAME.to_string(),
            exclude_output: false,
            empty_file_policy: EmptyFilePolicy::Abort,
        }
    }
}

/// Result of a successful combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineOutcome {
    pub output_path: String,
    pub source_files: usize,
    pub skipped_files: usize,
    pub data_rows: usize,
    pub bytes_written: usize,
}

/// Merge every `.csv` blob under `directory` into `<directory><output_name>`.
///
/// Sources are taken in storage listing order. Nothing is written unless every
/// source was read and parsed; with no sources an empty blob is uploaded.
pub async fn combine(
    store: &dyn BlobStore,
    directory: &str,
    options: &CombineOptions,
) -> Result<CombineOutcome> {
    let directory = ensure_trailing_slash(directory);
    let output_path = format!("{}{}", directory, options.output_name);

    let listed = store
        .list(&directory)
        .await
        .map_err(|source| CombineError::Listing {
            directory: directory.to_string(),
            source,
        })?;

    let sources: Vec<String> = listed
        .into_iter()
        .filter(|name| name.ends_with(CSV_SUFFIX))
        .filter(|name| !(options.exclude_output && *name == output_path))
        .collect();

    debug!(
        directory = %directory,
        sources = sources.len(),
        "combining"
    );

    let mut merger = CsvMerger::new(options.empty_file_policy);
    for path in &sources {
        let bytes = store
            .read(path)
            .await
            .map_err(|source| CombineError::Read {
                path: path.clone(),
                source,
            })?;
        merger.append(path, bytes)?;
    }

    let merged = merger.finish()?;
    let bytes_written = merged.bytes.len();

    store
        .write(&output_path, merged.bytes)
        .await
        .map_err(|source| CombineError::Upload {
            path: output_path.clone(),
            source,
        })?;

    counter!("csvcombine.rows.combined").increment(merged.data_rows as u64);
    info!(
        path = %output_path,
        files = merged.source_files,
        rows = merged.data_rows,
        bytes = bytes_written,
        "Combined CSV saved"
    );

    Ok(CombineOutcome {
        output_path,
        source_files: merged.source_files,
        skipped_files: merged.skipped_files,
        data_rows: merged.data_rows,
        bytes_written,
    })
}

/// In-memory output buffer for one directory.
pub struct CsvMerger {
    writer: csv::Writer<Vec<u8>>,
    policy: EmptyFilePolicy,
    header_written: bool,
    source_files: usize,
    skipped_files: usize,
    data_rows: usize,
}

pub struct MergedCsv {
    pub bytes: Vec<u8>,
    pub source_files: usize,
    pub skipped_files: usize,
    pub data_rows: usize,
}

/// One logical CSV row: a blank line, or the text of a non-blank line.
#[derive(Debug, PartialEq, Eq)]
enum Row<'a> {
    Blank,
    Line(&'a str),
}

fn output_writer(buffer: Vec<u8>) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::CRLF)
        .from_writer(buffer)
}

/// Split `text` into logical rows without their terminators.
///
/// `\r\n`, `\n` and `\r` all end a row unless they sit inside a quoted field.
/// A quote only opens a quoted field at the start of a field. Blank lines are
/// kept as `Row::Blank`; a trailing terminator does not add a row.
fn split_rows(text: &str) -> Vec<Row<'_>> {
    let bytes = text.as_bytes();
    let mut rows = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut field_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_quotes {
            if b == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 1;
                } else {
                    in_quotes = false;
                }
            }
        } else {
            match b {
                b'"' if field_start => {
                    in_quotes = true;
                    field_start = false;
                }
                b',' => field_start = true,
                b'\r' | b'\n' => {
                    let line = &text[start..i];
                    rows.push(if line.is_empty() {
                        Row::Blank
                    } else {
                        Row::Line(line)
                    });
                    if b == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    start = i + 1;
                    field_start = true;
                }
                _ => field_start = false,
            }
        }
        i += 1;
    }

    if start < bytes.len() {
        rows.push(Row::Line(&text[start..]));
    }
    rows
}

impl CsvMerger {
    pub fn new(policy: EmptyFilePolicy) -> Self {
        Self {
            writer: output_writer(Vec::new()),
            policy,
            header_written: false,
            source_files: 0,
            skipped_files: 0,
            data_rows: 0,
        }
    }

    /// Append one source file. `path` is only used for error reporting.
    ///
    /// The first row of the file is its header, even when that row is blank.
    /// Blank rows are carried into the output as empty lines.
    pub fn append(&mut self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let text = String::from_utf8(bytes).map_err(|source| CombineError::Decode {
            path: path.to_string(),
            source,
        })?;

        let mut rows = split_rows(&text).into_iter();
        let header = match rows.next() {
            Some(row) => row,
            None => match self.policy {
                EmptyFilePolicy::Abort => {
                    return Err(CombineError::EmptyFile {
                        path: path.to_string(),
                    })
                }
                EmptyFilePolicy::Skip => {
                    warn!(path = %path, "Skipping CSV file with no rows");
                    self.skipped_files += 1;
                    return Ok(());
                }
            },
        };

        if !self.header_written {
            self.write_row(path, &header)?;
            self.header_written = true;
        }

        let mut data_rows = 0usize;
        for row in rows {
            data_rows += self.write_row(path, &row)?;
        }

        self.source_files += 1;
        self.data_rows += data_rows;
        debug!(path = %path, rows = data_rows, "appended");
        Ok(())
    }

    /// Write one logical row, returning how many records it produced.
    fn write_row(&mut self, path: &str, row: &Row<'_>) -> Result<usize> {
        match row {
            Row::Blank => {
                self.write_blank()?;
                Ok(1)
            }
            Row::Line(line) => {
                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes());

                let mut written = 0usize;
                for record in reader.records() {
                    let record = record.map_err(|source| CombineError::Parse {
                        path: path.to_string(),
                        source,
                    })?;
                    self.writer
                        .write_record(&record)
                        .map_err(|e| CombineError::Encode { source: e.into() })?;
                    written += 1;
                }
                Ok(written)
            }
        }
    }

    // An empty record goes through csv::Writer as `""`, so blank lines are
    // appended to the underlying buffer directly.
    fn write_blank(&mut self) -> Result<()> {
        let writer = std::mem::replace(&mut self.writer, output_writer(Vec::new()));
        let mut buffer = writer.into_inner().map_err(|e| CombineError::Encode {
            source: e.into_error(),
        })?;
        buffer.extend_from_slice(b"\r\n");
        self.writer = output_writer(buffer);
        Ok(())
    }

    pub fn finish(self) -> Result<MergedCsv> {
        let bytes = self
            .writer
            .into_inner()
            .map_err(|e| CombineError::Encode {
                source: e.into_error(),
            })?;

        Ok(MergedCsv {
            bytes,
            source_files: self.source_files,
            skipped_files: self.skipped_files,
            data_rows: self.data_rows,
        })
    }
}
