//! An operator session: source files plus the column resolver built from them

use crate::plan::{apply_actions, Action, PlanReport};
use crate::resolver::MergeResolver;
use crate::source::SourceReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source files and the unified columns built from their headers
#[derive(Debug, Clone)]
pub struct Session<R> {
    reader: R,
    files: Vec<PathBuf>,
    resolver: MergeResolver,
}

impl<R: SourceReader> Session<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            files: Vec::new(),
            resolver: MergeResolver::new(),
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn resolver(&self) -> &MergeResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut MergeResolver {
        &mut self.resolver
    }

    /// Add files not already in the session
    ///
    /// The columns are rebuilt only when at least one file was new. Returns
    /// the number of files added.
    pub fn add_files<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            if !self.files.iter().any(|f| f == path) {
                self.files.push(path.to_path_buf());
                added += 1;
            }
        }

        if added > 0 {
            debug!(added, total = self.files.len(), "source files added");
            self.resolver.rebuild(&self.files, &self.reader);
        }
        added
    }

    /// Replay plan actions against the current columns
    pub fn apply(&mut self, actions: &[Action]) -> PlanReport {
        apply_actions(&mut self.resolver, actions)
    }

    /// Whether there is anything to consolidate
    pub fn is_ready(&self) -> bool {
        !self.files.is_empty() && self.resolver.registry().selected().next().is_some()
    }

    /// Forget every file and column
    pub fn clear(&mut self) {
        self.files.clear();
        self.resolver.clear();
    }
}
