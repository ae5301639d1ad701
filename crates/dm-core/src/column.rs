//! Unified columns and their per-file header mappings

use std::path::{Path, PathBuf};

/// Stable identity of a unified column within a registry
///
/// Columns are compared by identity, never by header name: renames may
/// leave two columns with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub(crate) u64);

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered mapping from source file to the original header feeding a column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMappings {
    entries: Vec<(PathBuf, String)>,
}

impl FileMappings {
    /// Original header for a file, if the file feeds this column
    pub fn get(&self, file: &Path) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| f == file)
            .map(|(_, h)| h.as_str())
    }

    pub fn contains_file(&self, file: &Path) -> bool {
        self.entries.iter().any(|(f, _)| f == file)
    }

    /// Check if the exact (file, header) pair is present
    pub fn contains(&self, file: &Path, header: &str) -> bool {
        self.get(file) == Some(header)
    }

    /// Add a mapping unless the file is already mapped; returns whether it was added
    pub(crate) fn insert_if_absent(&mut self, file: impl Into<PathBuf>, header: impl Into<String>) -> bool {
        let file = file.into();
        if self.contains_file(&file) {
            return false;
        }
        self.entries.push((file, header.into()));
        true
    }

    /// Remove the exact (file, header) pair; returns whether it was present
    pub(crate) fn remove(&mut self, file: &Path, header: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(f, h)| !(f == file && h == header));
        self.entries.len() != before
    }

    /// True when no file is mapped by both sides
    pub fn is_disjoint(&self, other: &FileMappings) -> bool {
        !self.entries.iter().any(|(f, _)| other.contains_file(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.entries.iter().map(|(f, h)| (f.as_path(), h.as_str()))
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|(f, _)| f.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One column of the consolidated schema
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedColumn {
    id: ColumnId,
    /// Display and output header
    pub header_name: String,
    /// Unselected columns are left out of every output row
    pub is_selected: bool,
    is_custom: bool,
    /// Value emitted by a custom column
    pub default_value: String,
    file_mappings: FileMappings,
}

impl UnifiedColumn {
    /// Column fed by a single file
    pub(crate) fn mapped(id: ColumnId, file: impl Into<PathBuf>, header: impl Into<String>) -> Self {
        let header = header.into();
        let mut file_mappings = FileMappings::default();
        file_mappings.insert_if_absent(file, header.clone());
        Self {
            id,
            header_name: header,
            is_selected: true,
            is_custom: false,
            default_value: String::new(),
            file_mappings,
        }
    }

    /// Manually added column with no source mapping
    pub(crate) fn custom(id: ColumnId, header: impl Into<String>) -> Self {
        Self {
            id,
            header_name: header.into(),
            is_selected: true,
            is_custom: true,
            default_value: String::new(),
            file_mappings: FileMappings::default(),
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn is_custom(&self) -> bool {
        self.is_custom
    }

    pub fn file_mappings(&self) -> &FileMappings {
        &self.file_mappings
    }

    pub(crate) fn file_mappings_mut(&mut self) -> &mut FileMappings {
        &mut self.file_mappings
    }

    /// True iff no source file feeds both columns
    pub fn can_merge_with(&self, other: &UnifiedColumn) -> bool {
        self.file_mappings.is_disjoint(&other.file_mappings)
    }

    /// Short provenance label: "Manual" or the number of contributing files
    pub fn source_label(&self) -> String {
        if self.is_custom {
            "Manual".to_string()
        } else {
            format!("{} source(s)", self.file_mappings.len())
        }
    }
}
