//! Preview and consolidation runs over a column snapshot
//!
//! The pipeline borrows the column list for the duration of a run, so the
//! resolver cannot be mutated while rows are being produced.

use crate::column::UnifiedColumn;
use crate::error::Result;
use crate::export::{ExportSummary, RowWriter};
use crate::source::SourceReader;
use crate::table::{eq_ignore_case, Record};
use crate::transform::{ensure_headers_named, RowTransformer, TransformOptions, PERIODO_A, PERIODO_L};
use std::path::Path;
use tracing::{debug, info};

/// Rows shown by a preview when the caller does not say otherwise
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Drives a [`RowTransformer`] over source files
#[derive(Debug, Clone)]
pub struct ConsolidationPipeline<R, W> {
    reader: R,
    writer: W,
    options: TransformOptions,
}

impl<R: SourceReader, W: RowWriter> ConsolidationPipeline<R, W> {
    pub fn new(reader: R, writer: W, options: TransformOptions) -> Self {
        Self {
            reader,
            writer,
            options,
        }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Transform rows until `max_rows` have been produced
    ///
    /// Files are visited in order. Once the cap is reached no further rows
    /// of the current file are read and later files are never opened.
    pub fn preview<P: AsRef<Path>>(
        &self,
        files: &[P],
        columns: &[UnifiedColumn],
        max_rows: usize,
    ) -> Result<Vec<Record>> {
        self.run(files, columns, Some(max_rows))
    }

    /// Transform every row of every file, in file order then row order
    pub fn consolidate<P: AsRef<Path>>(
        &self,
        files: &[P],
        columns: &[UnifiedColumn],
    ) -> Result<Vec<Record>> {
        ensure_headers_named(columns)?;
        self.run(files, columns, None)
    }

    /// Write `rows` to `path` through the configured writer
    ///
    /// The header line is the output schema of `columns`, so a consolidation
    /// without rows still exports its headers.
    pub fn export(
        &self,
        path: &Path,
        columns: &[UnifiedColumn],
        rows: &[Record],
    ) -> Result<ExportSummary> {
        let transformer = RowTransformer::new(columns, &self.options)?;
        let headers: Vec<String> = transformer.headers().into_iter().map(String::from).collect();

        self.writer.write_rows(path, &headers, rows)?;
        info!(path = %path.display(), rows = rows.len(), "exported consolidation");
        Ok(ExportSummary {
            path: path.to_path_buf(),
            rows_written: rows.len(),
        })
    }

    fn run<P: AsRef<Path>>(
        &self,
        files: &[P],
        columns: &[UnifiedColumn],
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let mut output = Vec::new();
        if limit == Some(0) {
            return Ok(output);
        }

        let transformer = RowTransformer::new(columns, &self.options)?;

        'files: for file in files {
            let file = file.as_ref();
            for row in self.reader.read_rows(file) {
                output.push(transformer.transform(file, &row));
                if limit.is_some_and(|max| output.len() >= max) {
                    break 'files;
                }
            }
        }

        debug!(rows = output.len(), files = files.len(), "transformed rows");
        Ok(output)
    }
}

/// Header names a display should show: selected columns plus enabled periods
pub fn active_headers(columns: &[UnifiedColumn], options: &TransformOptions) -> Vec<String> {
    let mut active: Vec<String> = columns
        .iter()
        .filter(|c| c.is_selected)
        .map(|c| c.header_name.clone())
        .collect();
    if options.generate_periods {
        active.push(PERIODO_L.to_string());
        active.push(PERIODO_A.to_string());
    }
    active
}

/// Keep only active keys (ignoring case); rows left with no keys are dropped
pub fn filter_for_display(rows: &[Record], active: &[String]) -> Vec<Record> {
    rows.iter()
        .map(|row| {
            row.iter()
                .filter(|(key, _)| active.iter().any(|a| eq_ignore_case(a, key)))
                .map(|(key, value)| (key, value.clone()))
                .collect::<Record>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::export::FileWriter;
    use crate::resolver::MergeResolver;
    use crate::source::{MemorySource, RowIter};
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Reader that records every file it opens and every row it yields
    struct CountingSource {
        inner: MemorySource,
        opened: RefCell<Vec<PathBuf>>,
        yielded: RefCell<usize>,
    }

    impl SourceReader for CountingSource {
        fn list_headers(&self, path: &Path) -> Vec<String> {
            self.inner.list_headers(path)
        }

        fn read_rows<'a>(&'a self, path: &Path) -> RowIter<'a> {
            self.opened.borrow_mut().push(path.to_path_buf());
            Box::new(self.inner.read_rows(path).inspect(move |_| {
                *self.yielded.borrow_mut() += 1;
            }))
        }
    }

    fn counting_source(files: &[&str], rows_per_file: usize) -> CountingSource {
        let mut inner = MemorySource::new();
        for file in files {
            let mut csv = String::from("Value\n");
            for i in 0..rows_per_file {
                csv.push_str(&format!("{}-{}\n", file, i));
            }
            inner.insert_csv(*file, &csv).unwrap();
        }
        CountingSource {
            inner,
            opened: RefCell::new(Vec::new()),
            yielded: RefCell::new(0),
        }
    }

    fn resolver_for<R: SourceReader>(files: &[&str], reader: &R) -> MergeResolver {
        let mut resolver = MergeResolver::new();
        resolver.rebuild(files, reader);
        resolver
    }

    #[test]
    fn test_preview_stops_at_cap() {
        let files = ["a.csv", "b.csv", "c.csv", "d.csv"];
        let source = counting_source(&files[..3], 5);
        let resolver = resolver_for(&files, &source);
        source.opened.borrow_mut().clear();

        let pipeline = ConsolidationPipeline::new(&source, FileWriter::new(), TransformOptions::default());
        let rows = pipeline.preview(&files, resolver.columns(), 7).unwrap();

        assert_eq!(rows.len(), 7);
        assert_eq!(*source.yielded.borrow(), 7);
        assert_eq!(
            *source.opened.borrow(),
            vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]
        );
        assert_eq!(rows[6].get("Value").unwrap().to_string_value(), "b.csv-1");
    }

    #[test]
    fn test_preview_zero_rows_reads_nothing() {
        let files = ["a.csv"];
        let source = counting_source(&files, 3);
        let resolver = resolver_for(&files, &source);

        let pipeline = ConsolidationPipeline::new(&source, FileWriter::new(), TransformOptions::default());
        assert!(pipeline.preview(&files, resolver.columns(), 0).unwrap().is_empty());
        assert!(source.opened.borrow().is_empty());
    }

    #[test]
    fn test_consolidate_reads_everything_in_order() {
        let files = ["a.csv", "b.csv", "c.csv"];
        let source = counting_source(&files, 5);
        let resolver = resolver_for(&files, &source);

        let pipeline = ConsolidationPipeline::new(&source, FileWriter::new(), TransformOptions::default());
        let rows = pipeline.consolidate(&files, resolver.columns()).unwrap();

        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0].get("Value").unwrap().to_string_value(), "a.csv-0");
        assert_eq!(rows[14].get("Value").unwrap().to_string_value(), "c.csv-4");
    }

    #[test]
    fn test_consolidate_rejects_blank_header_before_reading() {
        let files = ["a.csv"];
        let source = counting_source(&files, 2);
        let mut resolver = resolver_for(&files, &source);
        resolver.rename(resolver.find("Value").unwrap(), "");
        source.opened.borrow_mut().clear();

        let pipeline = ConsolidationPipeline::new(&source, FileWriter::new(), TransformOptions::default());
        let err = pipeline.consolidate(&files, resolver.columns()).unwrap_err();

        assert!(matches!(err, Error::BlankHeader(0)));
        assert!(source.opened.borrow().is_empty());
    }

    #[test]
    fn test_export_reports_rows_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut source = MemorySource::new();
        source.insert_csv("a.csv", "A\n1\n").unwrap();
        let resolver = resolver_for(&["a.csv"], &source);

        let pipeline = ConsolidationPipeline::new(&source, FileWriter::new(), TransformOptions::default());
        let rows = pipeline.consolidate(&["a.csv"], resolver.columns()).unwrap();
        let summary = pipeline.export(&path, resolver.columns(), &rows).unwrap();

        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.path, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A\n1\n");
    }

    #[test]
    fn test_export_header_only_source_keeps_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut source = MemorySource::new();
        source.insert_csv("empty.csv", "Name,Code\n").unwrap();
        let resolver = resolver_for(&["empty.csv"], &source);

        let pipeline = ConsolidationPipeline::new(&source, FileWriter::new(), TransformOptions::default());
        let rows = pipeline.consolidate(&["empty.csv"], resolver.columns()).unwrap();
        assert!(rows.is_empty());

        let summary = pipeline.export(&path, resolver.columns(), &rows).unwrap();
        assert_eq!(summary.rows_written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Name,Code\n");
    }

    #[test]
    fn test_export_headers_follow_options_and_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let mut source = MemorySource::new();
        source.insert_csv("a.csv", "Name,Hidden\n").unwrap();
        let mut resolver = resolver_for(&["a.csv"], &source);
        resolver.set_selected(resolver.find("Hidden").unwrap(), false);

        let options = TransformOptions {
            generate_periods: true,
            ..Default::default()
        };
        let pipeline = ConsolidationPipeline::new(&source, FileWriter::new(), options);
        pipeline.export(&path, resolver.columns(), &[]).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "PeriodoL\tPeriodoA\tName\n");
    }

    #[test]
    fn test_display_filter() {
        let mut source = MemorySource::new();
        source.insert_csv("a.csv", "Name,Hidden\n").unwrap();
        let mut resolver = resolver_for(&["a.csv"], &source);
        resolver.set_selected(resolver.find("Hidden").unwrap(), false);

        let options = TransformOptions {
            generate_periods: true,
            ..Default::default()
        };
        let active = active_headers(resolver.columns(), &options);
        assert_eq!(active, vec!["Name", "PeriodoL", "PeriodoA"]);

        let rows: Vec<Record> = vec![
            [("name", "Bob"), ("Hidden", "x")].into_iter().collect(),
            [("Hidden", "y")].into_iter().collect(),
        ];
        let shown = filter_for_display(&rows, &active);

        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].keys().collect::<Vec<_>>(), vec!["name"]);
    }
}
