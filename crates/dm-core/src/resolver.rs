//! Merge resolution protocol over the column registry
//!
//! The resolver owns the registry plus the optional merge target and keeps
//! the per-column merge state current after every mutation. Every operation
//! checks its preconditions before touching anything: a call whose guard
//! fails returns `false` (or `None`) and leaves the registry exactly as it
//! was.

use crate::column::{ColumnId, UnifiedColumn};
use crate::registry::ColumnRegistry;
use crate::source::SourceReader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Header given to a custom column when the operator does not name it
pub const DEFAULT_CUSTOM_HEADER: &str = "New Column";

/// Placeholder columns and the column each must follow
pub const STANDARD_PLACEHOLDERS: &[(&str, &str)] = &[
    ("SUBCATEGORIA", "Barrio_desc"),
    ("FECHA_PAGO", "Medidor"),
    ("USRS_LEGAL", "FECHA_PAGO"),
];

/// Role of a column relative to the current merge target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// The column is the merge target
    Target,
    /// The column can be merged into the target
    Mergeable,
    /// No target, or the column shares a source file with the target
    Idle,
}

/// Where a new custom column goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Front,
    Back,
}

/// Compute the merge state of every column against `target`
pub fn recompute_merge_eligibility(
    columns: &[UnifiedColumn],
    target: Option<ColumnId>,
) -> BTreeMap<ColumnId, MergeState> {
    let target_col = target.and_then(|id| columns.iter().find(|c| c.id() == id));

    columns
        .iter()
        .map(|col| {
            let state = match target_col {
                Some(t) if t.id() == col.id() => MergeState::Target,
                Some(t) if t.can_merge_with(col) => MergeState::Mergeable,
                _ => MergeState::Idle,
            };
            (col.id(), state)
        })
        .collect()
}

/// Operator-facing protocol for reshaping the unified column set
#[derive(Debug, Clone, Default)]
pub struct MergeResolver {
    registry: ColumnRegistry,
    target: Option<ColumnId>,
    eligibility: BTreeMap<ColumnId, MergeState>,
}

impl MergeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    pub fn columns(&self) -> &[UnifiedColumn] {
        self.registry.columns()
    }

    pub fn target(&self) -> Option<ColumnId> {
        self.target
    }

    /// Merge state of every column, as of the last mutation
    pub fn eligibility(&self) -> &BTreeMap<ColumnId, MergeState> {
        &self.eligibility
    }

    pub fn state_of(&self, id: ColumnId) -> Option<MergeState> {
        self.eligibility.get(&id).copied()
    }

    fn refresh(&mut self) {
        self.eligibility = recompute_merge_eligibility(self.registry.columns(), self.target);
        debug_assert!(self.registry.mappings_are_unique());
    }

    /// Rebuild the registry from the headers of `files`
    ///
    /// The target is cleared when its column does not survive the rebuild.
    pub fn rebuild<P, R>(&mut self, files: &[P], reader: &R)
    where
        P: AsRef<Path>,
        R: SourceReader + ?Sized,
    {
        self.registry.rebuild(files, reader);
        if self.target.is_some_and(|id| self.registry.get(id).is_none()) {
            self.target = None;
        }
        self.refresh();
    }

    /// Toggle the merge target
    ///
    /// Selecting the current target (or passing `None`) clears it. Unknown
    /// ids are ignored. Returns the target after the call.
    pub fn set_target(&mut self, column: Option<ColumnId>) -> Option<ColumnId> {
        match column {
            None => self.target = None,
            Some(id) if self.target == Some(id) => self.target = None,
            Some(id) if self.registry.get(id).is_some() => self.target = Some(id),
            Some(_) => return self.target,
        }
        self.refresh();
        self.target
    }

    /// Check if `source` may be merged into the current target
    pub fn can_merge(&self, source: ColumnId) -> bool {
        let Some(target_id) = self.target else {
            return false;
        };
        if target_id == source {
            return false;
        }
        match (self.registry.get(target_id), self.registry.get(source)) {
            (Some(target), Some(source)) => target.can_merge_with(source),
            _ => false,
        }
    }

    /// Merge `source` into the current target
    ///
    /// The target keeps its own mapping for any file it already has; the
    /// source column is removed.
    pub fn merge(&mut self, source: ColumnId) -> bool {
        if !self.can_merge(source) {
            return false;
        }
        let Some(target_id) = self.target else {
            return false;
        };
        let Some(source_col) = self.registry.remove(source) else {
            return false;
        };
        let Some(target) = self.registry.get_mut(target_id) else {
            return false;
        };

        for (file, header) in source_col.file_mappings().iter() {
            target.file_mappings_mut().insert_if_absent(file, header);
        }

        debug!(
            source = %source_col.header_name,
            target = %target.header_name,
            sources = target.file_mappings().len(),
            "merged column"
        );
        self.refresh();
        true
    }

    /// Check if the (file, header) mapping is owned by some column
    pub fn can_detach(&self, file: &Path, header: &str) -> bool {
        self.registry.owner_of(file, header).is_some()
    }

    /// Split one file's mapping off its column into a new column
    ///
    /// The new column is named after the original header and inserted right
    /// after its parent. A non-custom parent left without mappings is
    /// removed. Returns the new column's id.
    pub fn detach(&mut self, file: &Path, header: &str) -> Option<ColumnId> {
        let parent_id = self.registry.owner_of(file, header)?.id();
        let index = self.registry.index_of(parent_id)?;

        let parent = self.registry.get_mut(parent_id)?;
        parent.file_mappings_mut().remove(file, header);
        let parent_emptied = parent.file_mappings().is_empty() && !parent.is_custom();

        let column = self.registry.new_mapped(file, header);
        let new_id = column.id();
        self.registry.insert(index + 1, column);

        if parent_emptied {
            self.registry.remove(parent_id);
            if self.target == Some(parent_id) {
                self.target = None;
            }
        }

        debug!(file = %file.display(), header, "detached mapping");
        self.refresh();
        Some(new_id)
    }

    /// Add a custom column with an empty default value
    pub fn add_custom(&mut self, header: impl Into<String>, position: Position) -> ColumnId {
        let column = self.registry.new_custom(header);
        let id = column.id();
        match position {
            Position::Front => self.registry.insert(0, column),
            Position::Back => self.registry.push(column),
        }
        self.refresh();
        id
    }

    /// Remove a column
    pub fn remove(&mut self, id: ColumnId) -> bool {
        if self.registry.remove(id).is_none() {
            return false;
        }
        if self.target == Some(id) {
            self.target = None;
        }
        self.refresh();
        true
    }

    /// Place a fresh custom column named `header` right after `after`
    ///
    /// Any existing column with that header (ignoring case) is removed
    /// first. Without a matching anchor the column is appended.
    pub fn inject_placeholder(&mut self, header: &str, after: &str) -> ColumnId {
        if let Some(existing) = self.registry.find_by_header(header).map(|c| c.id()) {
            self.registry.remove(existing);
            if self.target == Some(existing) {
                self.target = None;
            }
        }

        let column = self.registry.new_custom(header);
        let id = column.id();
        match self
            .registry
            .find_by_header(after)
            .and_then(|anchor| self.registry.index_of(anchor.id()))
        {
            Some(index) => self.registry.insert(index + 1, column),
            None => self.registry.push(column),
        }

        self.refresh();
        id
    }

    /// Inject every entry of [`STANDARD_PLACEHOLDERS`], in order
    pub fn inject_standard_placeholders(&mut self) {
        for (header, after) in STANDARD_PLACEHOLDERS {
            self.inject_placeholder(header, after);
        }
    }

    /// Rename a column; the new name may duplicate another column's
    pub fn rename(&mut self, id: ColumnId, header: impl Into<String>) -> bool {
        match self.registry.get_mut(id) {
            Some(col) => {
                col.header_name = header.into();
                true
            }
            None => false,
        }
    }

    pub fn set_selected(&mut self, id: ColumnId, selected: bool) -> bool {
        match self.registry.get_mut(id) {
            Some(col) => {
                col.is_selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn select_all(&mut self) {
        self.registry.columns_mut().for_each(|c| c.is_selected = true);
    }

    pub fn deselect_all(&mut self) {
        self.registry.columns_mut().for_each(|c| c.is_selected = false);
    }

    /// Set the value a custom column emits; ignored for mapped columns
    pub fn set_default_value(&mut self, id: ColumnId, value: impl Into<String>) -> bool {
        match self.registry.get_mut(id) {
            Some(col) if col.is_custom() => {
                col.default_value = value.into();
                true
            }
            _ => false,
        }
    }

    /// Drop every column and the target
    pub fn clear(&mut self) {
        self.registry.clear();
        self.target = None;
        self.refresh();
    }

    /// First column whose header equals `name`, ignoring case
    pub fn find(&self, name: &str) -> Option<ColumnId> {
        self.registry.find_by_header(name).map(|c| c.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::path::PathBuf;

    fn resolver_for(tables: &[(&str, &str)]) -> MergeResolver {
        let mut source = MemorySource::new();
        let mut files = Vec::new();
        for (path, csv) in tables {
            source.insert_csv(*path, csv).unwrap();
            files.push(PathBuf::from(path));
        }
        let mut resolver = MergeResolver::new();
        resolver.rebuild(&files, &source);
        resolver
    }

    fn headers(resolver: &MergeResolver) -> Vec<&str> {
        resolver
            .columns()
            .iter()
            .map(|c| c.header_name.as_str())
            .collect()
    }

    fn id(resolver: &MergeResolver, name: &str) -> ColumnId {
        resolver.find(name).unwrap()
    }

    #[test]
    fn test_set_target_toggles() {
        let mut r = resolver_for(&[("a.csv", "Name\n"), ("b.csv", "Nombre\n")]);
        let name = id(&r, "Name");

        assert_eq!(r.set_target(Some(name)), Some(name));
        assert_eq!(r.state_of(name), Some(MergeState::Target));
        assert_eq!(r.state_of(id(&r, "Nombre")), Some(MergeState::Mergeable));

        assert_eq!(r.set_target(Some(name)), None);
        assert!(r.eligibility().values().all(|s| *s == MergeState::Idle));
    }

    #[test]
    fn test_eligibility_excludes_shared_files() {
        let mut r = resolver_for(&[("a.csv", "Name,Alias\n"), ("b.csv", "Nombre\n")]);
        r.set_target(Some(id(&r, "Name")));

        assert_eq!(r.state_of(id(&r, "Alias")), Some(MergeState::Idle));
        assert_eq!(r.state_of(id(&r, "Nombre")), Some(MergeState::Mergeable));
    }

    #[test]
    fn test_merge_moves_mappings_and_removes_source() {
        let mut r = resolver_for(&[("a.csv", "Name\n"), ("b.csv", "Nombre\n")]);
        let name = id(&r, "Name");
        r.set_target(Some(name));

        assert!(r.merge(id(&r, "Nombre")));
        assert_eq!(headers(&r), vec!["Name"]);

        let merged = r.registry().get(name).unwrap();
        assert_eq!(merged.file_mappings().get(Path::new("b.csv")), Some("Nombre"));
        assert_eq!(merged.source_label(), "2 source(s)");
        assert_eq!(r.target(), Some(name));
    }

    #[test]
    fn test_merge_guards_are_no_ops() {
        let mut r = resolver_for(&[("a.csv", "Name,Alias\n"), ("b.csv", "Nombre\n")]);
        let name = id(&r, "Name");
        let before = r.columns().to_vec();

        // no target
        assert!(!r.merge(id(&r, "Nombre")));
        r.set_target(Some(name));
        // self merge
        assert!(!r.merge(name));
        // shared file
        assert!(!r.merge(id(&r, "Alias")));

        assert_eq!(r.columns(), &before[..]);
    }

    #[test]
    fn test_merge_target_keeps_existing_mapping() {
        // target maps a.csv and b.csv, source maps c.csv only: disjoint
        let mut r = resolver_for(&[
            ("a.csv", "Name\n"),
            ("b.csv", "NAME\n"),
            ("c.csv", "Nombre\n"),
        ]);
        let name = id(&r, "Name");
        r.set_target(Some(name));
        assert!(r.merge(id(&r, "Nombre")));

        let merged = r.registry().get(name).unwrap();
        assert_eq!(merged.file_mappings().get(Path::new("a.csv")), Some("Name"));
        assert_eq!(merged.file_mappings().get(Path::new("b.csv")), Some("NAME"));
        assert_eq!(merged.file_mappings().get(Path::new("c.csv")), Some("Nombre"));
    }

    #[test]
    fn test_detach_is_inverse_of_merge() {
        let mut r = resolver_for(&[("a.csv", "Name,Other\n"), ("b.csv", "Nombre\n")]);
        let name = id(&r, "Name");
        let other_before = r.registry().get(id(&r, "Other")).unwrap().clone();
        r.set_target(Some(name));
        r.merge(id(&r, "Nombre"));

        let detached = r.detach(Path::new("b.csv"), "Nombre").unwrap();
        let col = r.registry().get(detached).unwrap();

        assert_eq!(col.header_name, "Nombre");
        assert!(!col.is_custom());
        assert!(col.is_selected);
        assert_eq!(col.file_mappings().len(), 1);
        assert_eq!(col.file_mappings().get(Path::new("b.csv")), Some("Nombre"));

        // inserted right after its parent
        assert_eq!(headers(&r), vec!["Name", "Nombre", "Other"]);
        let parent = r.registry().get(name).unwrap();
        assert!(!parent.file_mappings().contains_file(Path::new("b.csv")));
        assert_eq!(r.registry().get(other_before.id()), Some(&other_before));
        assert!(r.registry().mappings_are_unique());
    }

    #[test]
    fn test_detach_last_mapping_removes_parent_and_target() {
        let mut r = resolver_for(&[("a.csv", "Name\n")]);
        let name = id(&r, "Name");
        r.rename(name, "Renamed");
        r.set_target(Some(name));

        let new_id = r.detach(Path::new("a.csv"), "Name").unwrap();

        assert!(r.registry().get(name).is_none());
        assert_eq!(r.target(), None);
        assert_eq!(headers(&r), vec!["Name"]);
        assert_eq!(r.state_of(new_id), Some(MergeState::Idle));
    }

    #[test]
    fn test_detach_unknown_pair_is_no_op() {
        let mut r = resolver_for(&[("a.csv", "Name\n")]);
        let before = r.columns().to_vec();

        assert!(!r.can_detach(Path::new("a.csv"), "Missing"));
        assert_eq!(r.detach(Path::new("a.csv"), "Missing"), None);
        assert_eq!(r.columns(), &before[..]);
    }

    #[test]
    fn test_add_custom_and_remove() {
        let mut r = resolver_for(&[("a.csv", "Name\n")]);
        let front = r.add_custom(DEFAULT_CUSTOM_HEADER, Position::Front);
        let back = r.add_custom("Tail", Position::Back);

        assert_eq!(headers(&r), vec!["New Column", "Name", "Tail"]);
        assert!(r.registry().get(front).unwrap().is_custom());

        r.set_target(Some(back));
        assert!(r.remove(back));
        assert_eq!(r.target(), None);
        assert!(!r.remove(back));
    }

    #[test]
    fn test_inject_placeholder_is_idempotent() {
        let mut r = resolver_for(&[("a.csv", "Barrio_desc,Medidor,Total\n")]);

        r.inject_standard_placeholders();
        r.inject_standard_placeholders();

        assert_eq!(
            headers(&r),
            vec![
                "Barrio_desc",
                "SUBCATEGORIA",
                "Medidor",
                "FECHA_PAGO",
                "USRS_LEGAL",
                "Total"
            ]
        );
        assert!(r.columns()[1].is_custom());
    }

    #[test]
    fn test_inject_placeholder_replaces_mapped_column_and_appends_without_anchor() {
        let mut r = resolver_for(&[("a.csv", "subcategoria,Total\n")]);
        r.inject_placeholder("SUBCATEGORIA", "Nowhere");

        assert_eq!(headers(&r), vec!["Total", "SUBCATEGORIA"]);
        assert!(r.columns()[1].is_custom());
        assert!(r.columns()[1].default_value.is_empty());
    }

    #[test]
    fn test_set_default_value_only_for_custom() {
        let mut r = resolver_for(&[("a.csv", "Name\n")]);
        let custom = r.add_custom("Fixed", Position::Front);

        assert!(r.set_default_value(custom, "X"));
        assert!(!r.set_default_value(id(&r, "Name"), "X"));
        assert_eq!(r.registry().get(custom).unwrap().default_value, "X");
    }

    #[test]
    fn test_rebuild_clears_vanished_target() {
        let mut source = MemorySource::new();
        source.insert_csv("a.csv", "Name\n").unwrap();
        let mut r = MergeResolver::new();
        r.rebuild(&["a.csv"], &source);
        r.set_target(Some(id(&r, "Name")));

        r.rebuild(&["a.csv"], &source);
        assert_eq!(r.target(), None);
    }

    #[test]
    fn test_select_and_clear() {
        let mut r = resolver_for(&[("a.csv", "A,B\n")]);
        r.deselect_all();
        assert_eq!(r.registry().selected().count(), 0);
        r.select_all();
        assert_eq!(r.registry().selected().count(), 2);

        r.clear();
        assert!(r.columns().is_empty());
        assert!(r.eligibility().is_empty());
    }

    #[test]
    fn test_mapping_uniqueness_survives_operation_sequence() {
        let mut r = resolver_for(&[
            ("a.csv", "Name,Code\n"),
            ("b.csv", "Nombre,Codigo\n"),
            ("c.csv", "name\n"),
        ]);
        let name = id(&r, "Name");
        r.set_target(Some(name));
        r.merge(id(&r, "Nombre"));
        let code = id(&r, "Code");
        r.set_target(Some(code));
        r.merge(id(&r, "Codigo"));
        let lone = r.detach(Path::new("c.csv"), "name").unwrap();
        r.detach(Path::new("a.csv"), "Code");
        r.set_target(Some(name));
        assert!(r.merge(lone));
        r.remove(code);

        assert!(r.registry().mappings_are_unique());
    }
}
