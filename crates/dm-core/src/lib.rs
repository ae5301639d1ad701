//! dm-core: Column unification and row consolidation for tabular files
//!
//! This library provides functionality to:
//! - Read headers and rows from delimited files and spreadsheet workbooks
//! - Build one unified column per distinct header across files
//! - Merge, split, rename and inject columns while keeping every
//!   (file, header) mapping owned by exactly one column
//! - Re-map source rows onto the unified columns, with optional period
//!   columns and job-code cleaning
//! - Preview or export the consolidated rows
//! - Replay operator actions from JSON plan files

pub mod column;
pub mod error;
pub mod export;
pub mod period;
pub mod pipeline;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod source;
pub mod table;
pub mod transform;
pub mod workbook;

pub use column::{ColumnId, FileMappings, UnifiedColumn};
pub use error::{Error, Result};
pub use export::{default_export_name, ExportSummary, FileWriter, OutputFormat, RowWriter};
pub use period::{extract_period, parse_date, DateOrder};
pub use pipeline::{active_headers, filter_for_display, ConsolidationPipeline, DEFAULT_PREVIEW_ROWS};
pub use plan::{apply_actions, Action, PlanReport, SessionPlan};
pub use registry::ColumnRegistry;
pub use resolver::{recompute_merge_eligibility, MergeResolver, MergeState, Position};
pub use scanner::discover_sources;
pub use session::Session;
pub use source::{parse_csv_str, CsvSource, FileSource, MemorySource, RowIter, SourceReader};
pub use table::{CellValue, Record};
pub use transform::{
    clean_job, is_job_column, DuplicateHeaderPolicy, RowTransformer, TransformOptions,
};
pub use workbook::{write_workbook, WorkbookSource};
