//! Ordered collection of unified columns, rebuilt from source headers

use crate::column::{ColumnId, UnifiedColumn};
use crate::source::SourceReader;
use crate::table::eq_ignore_case;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// The authoritative, ordered list of unified columns
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: Vec<UnifiedColumn>,
    next_id: u64,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[UnifiedColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, id: ColumnId) -> Option<&UnifiedColumn> {
        self.columns.iter().find(|c| c.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: ColumnId) -> Option<&mut UnifiedColumn> {
        self.columns.iter_mut().find(|c| c.id() == id)
    }

    pub(crate) fn columns_mut(&mut self) -> impl Iterator<Item = &mut UnifiedColumn> {
        self.columns.iter_mut()
    }

    pub fn index_of(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id() == id)
    }

    /// First column whose header equals `name`, ignoring case
    pub fn find_by_header(&self, name: &str) -> Option<&UnifiedColumn> {
        self.columns.iter().find(|c| eq_ignore_case(&c.header_name, name))
    }

    /// Column currently owning the exact (file, header) mapping
    pub fn owner_of(&self, file: &Path, header: &str) -> Option<&UnifiedColumn> {
        self.columns
            .iter()
            .find(|c| c.file_mappings().contains(file, header))
    }

    /// Selected columns in registry order
    pub fn selected(&self) -> impl Iterator<Item = &UnifiedColumn> {
        self.columns.iter().filter(|c| c.is_selected)
    }

    fn allocate_id(&mut self) -> ColumnId {
        let id = ColumnId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn new_custom(&mut self, header: impl Into<String>) -> UnifiedColumn {
        let id = self.allocate_id();
        UnifiedColumn::custom(id, header)
    }

    pub(crate) fn new_mapped(&mut self, file: &Path, header: &str) -> UnifiedColumn {
        let id = self.allocate_id();
        UnifiedColumn::mapped(id, file, header)
    }

    /// Insert at `index`, clamped to the end of the list
    pub(crate) fn insert(&mut self, index: usize, column: UnifiedColumn) {
        let index = index.min(self.columns.len());
        self.columns.insert(index, column);
    }

    pub(crate) fn push(&mut self, column: UnifiedColumn) {
        self.columns.push(column);
    }

    pub(crate) fn remove(&mut self, id: ColumnId) -> Option<UnifiedColumn> {
        let index = self.index_of(id)?;
        Some(self.columns.remove(index))
    }

    pub(crate) fn clear(&mut self) {
        self.columns.clear();
    }

    /// Rebuild the non-custom columns from the headers of `files`
    ///
    /// Custom columns are kept, in their current relative order, at the
    /// front. Every other column is discarded and recomputed: one column per
    /// distinct header (ignoring case) in first-seen order, the first
    /// spelling seen becoming the header name. Blank headers are skipped, and
    /// a file whose headers cannot be read contributes nothing.
    pub fn rebuild<P, R>(&mut self, files: &[P], reader: &R)
    where
        P: AsRef<Path>,
        R: SourceReader + ?Sized,
    {
        let custom: Vec<UnifiedColumn> = self
            .columns
            .drain(..)
            .filter(|c| c.is_custom())
            .collect();

        let mut rebuilt: Vec<UnifiedColumn> = Vec::new();
        let mut by_header: HashMap<String, usize> = HashMap::new();

        for file in files {
            let file = file.as_ref();
            let headers = reader.list_headers(file);

            for header in headers {
                if header.trim().is_empty() {
                    continue;
                }

                match by_header.get(&header.to_lowercase()) {
                    Some(&idx) => {
                        // A file repeating a header under another case keeps its first one
                        rebuilt[idx].file_mappings_mut().insert_if_absent(file, header);
                    }
                    None => {
                        let column = self.new_mapped(file, &header);
                        by_header.insert(header.to_lowercase(), rebuilt.len());
                        rebuilt.push(column);
                    }
                }
            }
        }

        debug!(
            files = files.len(),
            custom = custom.len(),
            columns = rebuilt.len(),
            "rebuilt column registry"
        );

        self.columns = custom;
        self.columns.extend(rebuilt);
    }

    /// Check that no (file, header) mapping is owned by two columns
    pub fn mappings_are_unique(&self) -> bool {
        let mut seen = HashSet::new();
        self.columns
            .iter()
            .flat_map(|c| c.file_mappings().iter())
            .all(|pair| seen.insert(pair))
    }
}
