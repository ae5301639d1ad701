//! Plan files: replayable operator actions stored as JSON
//!
//! A plan names its source files, the transform options and an ordered list
//! of actions. Columns are referred to by header name (first match,
//! ignoring case) since column ids only live for one session.

use crate::error::{Error, Result};
use crate::resolver::{MergeResolver, Position, DEFAULT_CUSTOM_HEADER};
use crate::scanner::discover_sources;
use crate::transform::TransformOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One operator action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Merge column `source` into column `into`
    Merge { source: String, into: String },
    /// Split `file`'s `header` mapping off into its own column
    Detach { file: PathBuf, header: String },
    Rename { column: String, to: String },
    AddCustom {
        #[serde(default = "default_custom_header")]
        header: String,
        #[serde(default)]
        default_value: String,
        #[serde(default)]
        position: Position,
    },
    Remove { column: String },
    Select { column: String },
    Deselect { column: String },
    SelectAll,
    DeselectAll,
    /// Recreate `header` as an empty custom column right after `after`
    InjectPlaceholder { header: String, after: String },
    InjectStandardPlaceholders,
    SetDefault { column: String, value: String },
}

fn default_custom_header() -> String {
    DEFAULT_CUSTOM_HEADER.to_string()
}

/// A plan file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    /// Source files, in order
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Directories scanned for more source files
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
    #[serde(default)]
    pub options: TransformOptions,
    /// Actions replayed after the columns are built
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl SessionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a plan file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the plan file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Explicit files followed by the sources found under `dirs`
    pub fn source_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = self.files.clone();
        files.extend(discover_sources(&self.dirs)?);
        Ok(files)
    }

    /// Template written by `create-plan`
    pub fn template() -> Self {
        Self {
            files: vec![PathBuf::from("data/january.csv"), PathBuf::from("data/february.csv")],
            dirs: Vec::new(),
            options: TransformOptions {
                generate_periods: true,
                ..Default::default()
            },
            actions: vec![
                Action::Merge {
                    source: "Nombre".to_string(),
                    into: "Name".to_string(),
                },
                Action::AddCustom {
                    header: "Region".to_string(),
                    default_value: "North".to_string(),
                    position: Position::Front,
                },
                Action::InjectStandardPlaceholders,
            ],
        }
    }
}

/// Outcome of replaying actions
#[derive(Debug, Clone, Default)]
pub struct PlanReport {
    /// Number of actions applied
    pub applied: usize,
    /// Actions that were skipped, with their position and the reason
    pub skipped: Vec<(usize, Action, String)>,
}

impl PlanReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Fail on the first skipped action
    pub fn ensure_complete(&self) -> Result<()> {
        match self.skipped.first() {
            Some((index, _, message)) => Err(Error::PlanAction {
                index: *index,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Replay `actions` against `resolver`
///
/// Actions that do not apply (unknown column, ineligible merge, ...) leave
/// the resolver untouched and are reported as skipped.
pub fn apply_actions(resolver: &mut MergeResolver, actions: &[Action]) -> PlanReport {
    let mut report = PlanReport::default();

    for (index, action) in actions.iter().enumerate() {
        match apply_one(resolver, action) {
            Ok(()) => report.applied += 1,
            Err(reason) => {
                warn!(index, ?action, reason = %reason, "skipping plan action");
                report.skipped.push((index, action.clone(), reason));
            }
        }
    }

    report
}

fn apply_one(resolver: &mut MergeResolver, action: &Action) -> std::result::Result<(), String> {
    let find = |resolver: &MergeResolver, name: &str| {
        resolver
            .find(name)
            .ok_or_else(|| format!("no column named '{}'", name))
    };
    let applied = |ok: bool, what: &str| if ok { Ok(()) } else { Err(what.to_string()) };

    match action {
        Action::Merge { source, into } => {
            let target = find(resolver, into)?;
            let source_id = find(resolver, source)?;
            let previous = resolver.target();
            if previous != Some(target) {
                resolver.set_target(Some(target));
            }
            let merged = resolver.can_merge(source_id) && resolver.merge(source_id);
            if previous != Some(target) {
                let restore = previous.filter(|id| resolver.registry().get(*id).is_some());
                resolver.set_target(restore);
            }
            if merged {
                Ok(())
            } else {
                Err(format!("'{}' cannot be merged into '{}'", source, into))
            }
        }
        Action::Detach { file, header } => resolver
            .detach(file, header)
            .map(|_| ())
            .ok_or_else(|| format!("no column maps '{}' in {}", header, file.display())),
        Action::Rename { column, to } => {
            let id = find(resolver, column)?;
            applied(resolver.rename(id, to.as_str()), "rename was refused")
        }
        Action::AddCustom {
            header,
            default_value,
            position,
        } => {
            let id = resolver.add_custom(header.as_str(), *position);
            resolver.set_default_value(id, default_value.as_str());
            Ok(())
        }
        Action::Remove { column } => {
            let id = find(resolver, column)?;
            applied(resolver.remove(id), "remove was refused")
        }
        Action::Select { column } => {
            let id = find(resolver, column)?;
            applied(resolver.set_selected(id, true), "select was refused")
        }
        Action::Deselect { column } => {
            let id = find(resolver, column)?;
            applied(resolver.set_selected(id, false), "deselect was refused")
        }
        Action::SelectAll => {
            resolver.select_all();
            Ok(())
        }
        Action::DeselectAll => {
            resolver.deselect_all();
            Ok(())
        }
        Action::InjectPlaceholder { header, after } => {
            resolver.inject_placeholder(header, after);
            Ok(())
        }
        Action::InjectStandardPlaceholders => {
            resolver.inject_standard_placeholders();
            Ok(())
        }
        Action::SetDefault { column, value } => {
            let id = find(resolver, column)?;
            applied(
                resolver.set_default_value(id, value.as_str()),
                "only custom columns have a default value",
            )
        }
    }
}
