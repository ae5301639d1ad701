//! Mapping of raw source rows onto the unified column schema

use crate::column::{FileMappings, UnifiedColumn};
use crate::error::{Error, Result};
use crate::period::{extract_period, DateOrder};
use crate::table::{CellValue, Record};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source header feeding the legal-date period
pub const FECHA_LEG: &str = "Fecha_Leg";
/// Source header feeding the assignment-date period
pub const FECHA_ASIG: &str = "Fecha_Asig";
/// Output header of the legal-date period
pub const PERIODO_L: &str = "PeriodoL";
/// Output header of the assignment-date period
pub const PERIODO_A: &str = "PeriodoA";

/// What to do when two output columns end up with the same header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateHeaderPolicy {
    /// Refuse to build rows
    #[default]
    Error,
    /// Rename later duplicates to `Header_2`, `Header_3`, ...
    AutoSuffix,
    /// Keep one output cell; the later column's value replaces the earlier one
    LastWriteWins,
}

/// Feature flags for row transformation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Emit `PeriodoL` / `PeriodoA` derived from `Fecha_Leg` / `Fecha_Asig`
    pub generate_periods: bool,
    /// Reduce job-column values to their leading code
    pub clean_job_type: bool,
    pub date_order: DateOrder,
    pub duplicate_headers: DuplicateHeaderPolicy,
}

/// Check if a header names a job column ("Tipo" and "Trabajo", ignoring case)
pub fn is_job_column(header: &str) -> bool {
    if header.trim().is_empty() {
        return false;
    }
    let lower = header.to_lowercase();
    lower.contains("tipo") && lower.contains("trabajo")
}

/// Keep the part of a job value before the first `-`
///
/// `"100 - Engineer"` becomes `"100"`. Text without any non-empty fragment
/// is returned unchanged.
pub fn clean_job(value: &str) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    match value.split('-').find(|part| !part.is_empty()) {
        Some(first) => first.trim().to_string(),
        None => value.to_string(),
    }
}

/// Fail if any selected column has a blank header
pub fn ensure_headers_named(columns: &[UnifiedColumn]) -> Result<()> {
    match columns
        .iter()
        .position(|c| c.is_selected && c.header_name.trim().is_empty())
    {
        Some(index) => Err(Error::BlankHeader(index)),
        None => Ok(()),
    }
}

#[derive(Debug, Clone)]
enum CellSource {
    Fixed(CellValue),
    Mapped {
        mappings: FileMappings,
        clean_job: bool,
    },
}

#[derive(Debug, Clone)]
struct OutputColumn {
    header: String,
    source: CellSource,
}

/// Prepared transformation for one column snapshot
///
/// Built once per preview or consolidation run; `transform` is then a pure
/// function of the source file and row.
#[derive(Debug, Clone)]
pub struct RowTransformer {
    columns: Vec<OutputColumn>,
    options: TransformOptions,
}

impl RowTransformer {
    /// Resolve the selected columns and their output headers
    ///
    /// Fails only under [`DuplicateHeaderPolicy::Error`] when two output
    /// headers collide (period headers included when enabled).
    pub fn new(columns: &[UnifiedColumn], options: &TransformOptions) -> Result<Self> {
        let mut taken: Vec<String> = Vec::new();
        if options.generate_periods {
            taken.push(PERIODO_L.to_string());
            taken.push(PERIODO_A.to_string());
        }

        let mut output = Vec::new();
        for col in columns.iter().filter(|c| c.is_selected) {
            let header = resolve_header(&col.header_name, &taken, options.duplicate_headers)?;
            taken.push(header.clone());

            let source = if col.is_custom() {
                CellSource::Fixed(CellValue::text(col.default_value.as_str()))
            } else {
                CellSource::Mapped {
                    mappings: col.file_mappings().clone(),
                    clean_job: options.clean_job_type && is_job_column(&col.header_name),
                }
            };
            output.push(OutputColumn { header, source });
        }

        Ok(Self {
            columns: output,
            options: *options,
        })
    }

    /// Output headers in emission order, duplicates collapsed
    pub fn headers(&self) -> Vec<&str> {
        let mut headers: Vec<&str> = Vec::new();
        if self.options.generate_periods {
            headers.push(PERIODO_L);
            headers.push(PERIODO_A);
        }
        for col in &self.columns {
            if !headers.contains(&col.header.as_str()) {
                headers.push(&col.header);
            }
        }
        headers
    }

    /// Map one raw row read from `file` onto the output schema
    ///
    /// A column the file does not feed, or whose original header is missing
    /// from the row, yields an empty cell.
    pub fn transform(&self, file: &Path, row: &Record) -> Record {
        let mut out = Record::new();

        if self.options.generate_periods {
            for (source, target) in [(FECHA_LEG, PERIODO_L), (FECHA_ASIG, PERIODO_A)] {
                let period = row
                    .find_ignore_case(source)
                    .map(|v| extract_period(v, self.options.date_order))
                    .unwrap_or_default();
                out.insert(target, period);
            }
        }

        for col in &self.columns {
            let value = match &col.source {
                CellSource::Fixed(value) => value.clone(),
                CellSource::Mapped {
                    mappings,
                    clean_job: clean,
                } => {
                    let found = mappings.get(file).and_then(|original| row.get(original));
                    match found {
                        Some(value) if *clean => CellValue::text(clean_job(&value.to_string_value())),
                        Some(value) => value.clone(),
                        None => CellValue::Empty,
                    }
                }
            };
            out.insert(col.header.as_str(), value);
        }

        out
    }
}

fn resolve_header(header: &str, taken: &[String], policy: DuplicateHeaderPolicy) -> Result<String> {
    if !taken.iter().any(|t| t == header) {
        return Ok(header.to_string());
    }
    match policy {
        DuplicateHeaderPolicy::Error => Err(Error::DuplicateHeader(header.to_string())),
        DuplicateHeaderPolicy::LastWriteWins => Ok(header.to_string()),
        DuplicateHeaderPolicy::AutoSuffix => {
            let mut n = 2;
            loop {
                let candidate = format!("{}_{}", header, n);
                if !taken.contains(&candidate) {
                    return Ok(candidate);
                }
                n += 1;
            }
        }
    }
}
