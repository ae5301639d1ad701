//! Spreadsheet workbooks: reading the first worksheet and writing `.xlsx`

use crate::error::{Error, Result};
use crate::period::{parse_date, DateOrder};
use crate::source::{RowIter, SourceReader};
use crate::table::{CellValue, Record};
use calamine::{open_workbook_auto, Data, Range, Reader};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tracing::{debug, warn};

/// Reader for the first worksheet of a workbook; the first row holds the headers
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookSource;

impl WorkbookSource {
    pub fn new() -> Self {
        Self
    }

    /// Extensions this reader understands
    pub const EXTENSIONS: &'static [&'static str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

    fn open(path: &Path) -> Result<(Vec<String>, Range<Data>)> {
        let mut workbook = open_workbook_auto(path).map_err(|e| Error::Workbook {
            path: path.to_path_buf(),
            source: e,
        })?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::EmptyWorkbook {
                path: path.to_path_buf(),
            })?
            .map_err(|e| Error::Workbook {
                path: path.to_path_buf(),
                source: e,
            })?;

        let headers = (0..range.width())
            .map(|col| range.get((0, col)).map(header_text).unwrap_or_default())
            .collect();
        Ok((headers, range))
    }
}

impl SourceReader for WorkbookSource {
    fn list_headers(&self, path: &Path) -> Vec<String> {
        match Self::open(path) {
            Ok((headers, _)) => headers,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable workbook");
                Vec::new()
            }
        }
    }

    fn read_rows<'a>(&'a self, path: &Path) -> RowIter<'a> {
        match Self::open(path) {
            Ok((headers, range)) => {
                debug!(path = %path.display(), columns = headers.len(), rows = range.height().saturating_sub(1), "reading worksheet");
                Box::new((1..range.height()).map(move |row| {
                    headers
                        .iter()
                        .enumerate()
                        .map(|(col, header)| {
                            let value = range.get((row, col)).map(cell_value).unwrap_or(CellValue::Empty);
                            (header.clone(), value)
                        })
                        .collect()
                }))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable workbook");
                Box::new(std::iter::empty())
            }
        }
    }
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => cell_value(other).to_string_value(),
    }
}

/// Convert a worksheet cell; date cells stay dates
fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => CellValue::Date(dt),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match parse_date(s, DateOrder::default()) {
            Some(dt) => CellValue::Date(dt),
            None => CellValue::text(s.as_str()),
        },
        Data::DurationIso(s) => CellValue::text(s.as_str()),
    }
}

/// Write `headers` and `rows` to a single-sheet `.xlsx` workbook
pub fn write_workbook(path: &Path, headers: &[String], rows: &[Record]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    fill_sheet(sheet, headers, rows)
        .and_then(|()| workbook.save(path))
        .map_err(|e| match e {
            XlsxError::IoError(io) => Error::export(path, io),
            other => Error::Xlsx {
                path: path.to_path_buf(),
                source: other,
            },
        })
}

fn fill_sheet(sheet: &mut Worksheet, headers: &[String], rows: &[Record]) -> std::result::Result<(), XlsxError> {
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col_index(col)?, header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = u32::try_from(i + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, header) in headers.iter().enumerate() {
            let c = col_index(col)?;
            match row.get(header) {
                None | Some(CellValue::Empty) => {}
                Some(CellValue::Text(s)) => {
                    sheet.write_string(r, c, s)?;
                }
                Some(CellValue::Integer(n)) => {
                    sheet.write_number(r, c, *n as f64)?;
                }
                Some(CellValue::Float(f)) => {
                    sheet.write_number(r, c, *f)?;
                }
                Some(CellValue::Date(dt)) => {
                    let format = if dt.time() == chrono::NaiveTime::MIN {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    sheet.write_datetime_with_format(r, c, dt, format)?;
                }
            }
        }
    }

    Ok(())
}

fn col_index(col: usize) -> std::result::Result<u16, XlsxError> {
    u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)
}
