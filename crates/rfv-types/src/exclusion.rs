use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::path::RelativePath;

/// Literal names and paths that are never considered repository content.
///
/// Fixture repositories often carry marker files (`.gitkeep`) or bundled
/// reference documents next to the archive itself. Both enumerations apply the
/// same `ExclusionSet`, so adding or removing an excluded file on either side
/// never changes the verdict.
///
/// - `names` match the final segment of a path at any depth.
/// - `paths` match a whole relative path exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionSet {
    pub names: BTreeSet<String>,
    pub paths: BTreeSet<String>,
}

impl ExclusionSet {
    /// Excludes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The stock table for OCFL fixture repositories.
    pub fn ocfl_fixture() -> Self {
        Self::empty()
            .with_name(".gitkeep")
            .with_path("ocfl_1.1.md")
            .with_path("ocfl_1.0.txt")
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.paths.insert(path.into());
        self
    }

    /// Merge another table into this one.
    pub fn extend(&mut self, other: ExclusionSet) {
        self.names.extend(other.names);
        self.paths.extend(other.paths);
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_empty()
    }

    /// Returns `true` if `path` must be left out of both enumerations.
    pub fn is_excluded(&self, path: &RelativePath) -> bool {
        self.paths.contains(path.as_str()) || self.names.contains(path.file_name())
    }
}
