//! Directory scanner for discovering source files

use crate::error::Result;
use crate::source::{has_extension, CsvSource};
use crate::workbook::WorkbookSource;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scan one or more directories for readable source files
///
/// Returns the files sorted by path, without duplicates.
pub fn discover_sources<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>> {
    let mut found = BTreeSet::new();

    for root in roots {
        for entry in WalkDir::new(root.as_ref()).follow_links(true) {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type().is_file() && is_supported(path) {
                found.insert(path.to_path_buf());
            }
        }
    }

    Ok(found.into_iter().collect())
}

/// Check if the file extension is one a source reader understands
pub fn is_supported(path: &Path) -> bool {
    has_extension(path, CsvSource::EXTENSIONS) || has_extension(path, WorkbookSource::EXTENSIONS)
}
