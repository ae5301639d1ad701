//! Writing consolidated rows to disk

use crate::error::{Error, Result};
use crate::table::Record;
use crate::workbook::write_workbook;
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for consolidated rows
pub trait RowWriter {
    /// Write `headers` and `rows` to `path`, replacing any existing file
    ///
    /// The header line comes from `headers`, so an export without rows
    /// still carries its column schema.
    fn write_rows(&self, path: &Path, headers: &[String], rows: &[Record]) -> Result<()>;
}

impl<T: RowWriter + ?Sized> RowWriter for &T {
    fn write_rows(&self, path: &Path, headers: &[String], rows: &[Record]) -> Result<()> {
        (**self).write_rows(path, headers, rows)
    }
}

/// Encoding chosen from the destination's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Tsv,
    Json,
    Xlsx,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(OutputFormat::Csv),
            Some("tsv") => Ok(OutputFormat::Tsv),
            Some("json") => Ok(OutputFormat::Json),
            Some("xlsx") => Ok(OutputFormat::Xlsx),
            _ => Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Writer for `.csv`, `.tsv`, `.json` and `.xlsx` destinations
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWriter;

impl FileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl RowWriter for FileWriter {
    fn write_rows(&self, path: &Path, headers: &[String], rows: &[Record]) -> Result<()> {
        let format = OutputFormat::from_path(path)?;
        if format == OutputFormat::Xlsx {
            return write_workbook(path, headers, rows);
        }

        let file = File::create(path).map_err(|e| Error::export(path, e))?;
        let writer = BufWriter::new(file);

        match format {
            OutputFormat::Tsv => write_delimited(writer, path, headers, rows, b'\t'),
            OutputFormat::Json => write_json(writer, path, rows),
            _ => write_delimited(writer, path, headers, rows, b','),
        }
    }
}

/// Union of row keys in first-seen order
pub fn collect_headers(rows: &[Record]) -> Vec<&str> {
    let mut headers: Vec<&str> = Vec::new();
    for key in rows.iter().flat_map(|r| r.keys()) {
        if !headers.contains(&key) {
            headers.push(key);
        }
    }
    headers
}

fn write_delimited<W: Write>(
    out: W,
    path: &Path,
    headers: &[String],
    rows: &[Record],
    delimiter: u8,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(out);
    let export_err = |e: csv::Error| Error::export(path, e.into());

    if !headers.is_empty() {
        writer.write_record(headers).map_err(export_err)?;
    }

    for row in rows {
        let cells = headers
            .iter()
            .map(|h| row.get(h).map(|v| v.to_string_value()).unwrap_or_default());
        writer.write_record(cells).map_err(export_err)?;
    }

    writer.flush().map_err(|e| Error::export(path, e))
}

fn write_json<W: Write>(mut out: W, path: &Path, rows: &[Record]) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, rows).map_err(|e| Error::export(path, e.into()))?;
    writeln!(out).map_err(|e| Error::export(path, e))?;
    out.flush().map_err(|e| Error::export(path, e))
}

/// Default file stem suggested for a consolidation saved on `date`
pub fn default_export_name(date: NaiveDate) -> String {
    format!("Consolidado_{}", date.format("%Y%m%d"))
}

/// Result of an export
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// File that was written
    pub path: PathBuf,
    /// Number of data rows written
    pub rows_written: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceReader;
    use crate::table::CellValue;
    use crate::workbook::WorkbookSource;
    use std::fs;
    use std::io;

    /// Sink whose every write fails as if the disk were full
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }
    }

    fn headers() -> Vec<String> {
        vec!["Name".to_string(), "Note".to_string()]
    }

    fn rows() -> Vec<Record> {
        vec![
            [("Name", CellValue::text("Bob")), ("Note", CellValue::text("a,b"))]
                .into_iter()
                .collect(),
            [("Name", CellValue::text("Ana")), ("Note", CellValue::Empty)]
                .into_iter()
                .collect(),
        ]
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("x.CSV")).unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("x.tsv")).unwrap(), OutputFormat::Tsv);
        assert_eq!(OutputFormat::from_path(Path::new("x.json")).unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("x.xlsx")).unwrap(), OutputFormat::Xlsx);
        assert!(matches!(
            OutputFormat::from_path(Path::new("x.ods")),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_write_csv_escapes_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "stale content\n").unwrap();

        FileWriter::new().write_rows(&path, &headers(), &rows()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "Name,Note\nBob,\"a,b\"\nAna,\n");
    }

    #[test]
    fn test_write_without_rows_keeps_header_line() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("out.csv");
        let tsv = dir.path().join("out.tsv");

        FileWriter::new().write_rows(&csv, &headers(), &[]).unwrap();
        FileWriter::new().write_rows(&tsv, &headers(), &[]).unwrap();

        assert_eq!(fs::read_to_string(&csv).unwrap(), "Name,Note\n");
        assert_eq!(fs::read_to_string(&tsv).unwrap(), "Name\tNote\n");
    }

    #[test]
    fn test_write_json_keeps_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        FileWriter::new().write_rows(&path, &headers(), &rows()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["Name"], "Bob");
        assert_eq!(value[1]["Note"], "");
    }

    #[test]
    fn test_write_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");

        FileWriter::new().write_rows(&path, &headers(), &rows()).unwrap();

        let source = WorkbookSource::new();
        assert_eq!(source.list_headers(&path), headers());
        assert_eq!(source.read_rows(&path).count(), 2);
    }

    #[test]
    fn test_unwritable_destination_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");

        let err = FileWriter::new().write_rows(&path, &headers(), &rows()).unwrap_err();
        assert!(matches!(err, Error::Export { .. }));

        let book = dir.path().join("missing").join("out.xlsx");
        let err = FileWriter::new().write_rows(&book, &headers(), &rows()).unwrap_err();
        assert!(matches!(err, Error::Export { .. }));
    }

    #[test]
    fn test_failing_sink_reports_export_error() {
        let path = Path::new("full.csv");

        let err = write_delimited(FullDisk, path, &headers(), &rows(), b',').unwrap_err();
        assert!(matches!(err, Error::Export { .. }));

        let err = write_json(FullDisk, path, &rows()).unwrap_err();
        assert!(matches!(err, Error::Export { .. }));
    }

    #[test]
    fn test_collect_headers_unions_keys() {
        let rows: Vec<Record> = vec![
            [("A", "1")].into_iter().collect(),
            [("B", "2"), ("A", "3")].into_iter().collect(),
        ];
        assert_eq!(collect_headers(&rows), vec!["A", "B"]);
    }

    #[test]
    fn test_default_export_name() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(default_export_name(date), "Consolidado_20261019");
    }
}
