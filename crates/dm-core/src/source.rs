//! Source file readers
//!
//! A reader turns a source file into its ordered header list and a lazy
//! stream of header-keyed rows. Readers never fail outward: a missing,
//! corrupt or unsupported file is logged and contributes nothing.

use crate::error::{Error, Result};
use crate::table::{CellValue, Record};
use crate::workbook::WorkbookSource;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lazy stream of rows from one source file
pub type RowIter<'a> = Box<dyn Iterator<Item = Record> + 'a>;

/// Header and row access to source files
pub trait SourceReader {
    /// Ordered header names of a file, empty if the file cannot be read
    fn list_headers(&self, path: &Path) -> Vec<String>;

    /// Rows of a file in file order, empty if the file cannot be read
    fn read_rows<'a>(&'a self, path: &Path) -> RowIter<'a>;
}

impl<T: SourceReader + ?Sized> SourceReader for &T {
    fn list_headers(&self, path: &Path) -> Vec<String> {
        (**self).list_headers(path)
    }

    fn read_rows<'a>(&'a self, path: &Path) -> RowIter<'a> {
        (**self).read_rows(path)
    }
}

/// Reader for delimited text files (`.csv`, `.tsv`)
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSource;

impl CsvSource {
    pub fn new() -> Self {
        Self
    }

    /// Extensions this reader understands
    pub const EXTENSIONS: &'static [&'static str] = &["csv", "tsv"];

    fn open(path: &Path) -> Result<(Vec<String>, csv::Reader<BufReader<File>>)> {
        let file = File::open(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let reader = csv_reader(BufReader::new(file), delimiter_for(path));
        with_headers(reader, path)
    }
}

impl SourceReader for CsvSource {
    fn list_headers(&self, path: &Path) -> Vec<String> {
        match Self::open(path) {
            Ok((headers, _)) => headers,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable source");
                Vec::new()
            }
        }
    }

    fn read_rows<'a>(&'a self, path: &Path) -> RowIter<'a> {
        match Self::open(path) {
            Ok((headers, reader)) => {
                debug!(path = %path.display(), columns = headers.len(), "reading rows");
                Box::new(records(reader, headers, path.to_path_buf()))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable source");
                Box::new(std::iter::empty())
            }
        }
    }
}

/// Reader for every supported file type, chosen by extension
///
/// Workbook extensions go to [`WorkbookSource`]; anything else is read as
/// delimited text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource {
    csv: CsvSource,
    workbook: WorkbookSource,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn for_path(&self, path: &Path) -> &dyn SourceReader {
        if has_extension(path, WorkbookSource::EXTENSIONS) {
            &self.workbook
        } else {
            &self.csv
        }
    }
}

impl SourceReader for FileSource {
    fn list_headers(&self, path: &Path) -> Vec<String> {
        self.for_path(path).list_headers(path)
    }

    fn read_rows<'a>(&'a self, path: &Path) -> RowIter<'a> {
        self.for_path(path).read_rows(path)
    }
}

/// Check if the file extension is one of `extensions`, ignoring case
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

fn csv_reader<R: Read>(inner: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .delimiter(delimiter)
        .from_reader(inner)
}

fn with_headers<R: Read>(
    mut reader: csv::Reader<R>,
    path: &Path,
) -> Result<(Vec<String>, csv::Reader<R>)> {
    let headers = reader.headers().map_err(|e| Error::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    let headers: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i == 0 {
                name.trim_start_matches('\u{feff}').to_string()
            } else {
                name.to_string()
            }
        })
        .collect();

    Ok((headers, reader))
}

/// Turn csv records into header-keyed rows, stopping at the first bad record
fn records<R: Read>(
    reader: csv::Reader<R>,
    headers: Vec<String>,
    path: PathBuf,
) -> impl Iterator<Item = Record> {
    reader
        .into_records()
        .enumerate()
        .map_while(move |(row_idx, result)| {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), row = row_idx + 1, error = %e, "stopping at malformed record");
                    return None;
                }
            };

            if record.len() > headers.len() {
                warn!(
                    path = %path.display(),
                    row = row_idx + 1,
                    "row has more cells than columns, truncating"
                );
            }

            // Short rows are padded with empty cells
            let row = headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let value = record.get(i).map(CellValue::text).unwrap_or(CellValue::Empty);
                    (header.clone(), value)
                })
                .collect();
            Some(row)
        })
}

/// Parse delimited text from a string into headers and rows (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<(Vec<String>, Vec<Record>)> {
    let path = PathBuf::from(source_name);
    let reader = csv_reader(content.as_bytes(), delimiter_for(&path));
    let (headers, reader) = with_headers(reader, &path)?;
    let rows = records(reader, headers.clone(), path).collect();
    Ok((headers, rows))
}

/// In-memory reader keyed by path
///
/// Lets a host that already holds its tables in memory drive the engine
/// without going through the filesystem. Unknown paths behave like
/// unreadable files.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: BTreeMap<PathBuf, (Vec<String>, Vec<Record>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table under a path, replacing any previous one
    pub fn insert(&mut self, path: impl Into<PathBuf>, headers: Vec<String>, rows: Vec<Record>) {
        self.tables.insert(path.into(), (headers, rows));
    }

    /// Register a table given as delimited text
    pub fn insert_csv(&mut self, path: impl Into<PathBuf>, content: &str) -> Result<()> {
        let path = path.into();
        let (headers, rows) = parse_csv_str(content, &path.to_string_lossy())?;
        self.insert(path, headers, rows);
        Ok(())
    }
}

impl SourceReader for MemorySource {
    fn list_headers(&self, path: &Path) -> Vec<String> {
        self.tables
            .get(path)
            .map(|(headers, _)| headers.clone())
            .unwrap_or_default()
    }

    fn read_rows<'a>(&'a self, path: &Path) -> RowIter<'a> {
        match self.tables.get(path) {
            Some((_, rows)) => Box::new(rows.iter().cloned()),
            None => Box::new(std::iter::empty()),
        }
    }
}
