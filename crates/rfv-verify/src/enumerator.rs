use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use rfv_types::{ExclusionSet, RelativePath};
use tracing::trace;
use walkdir::WalkDir;

use crate::error::{VerifyError, VerifyResult};

/// Lazily enumerates the regular files under a local root as
/// [`RelativePath`]s, skipping excluded entries.
///
/// Symlinks are not followed, so a symlinked directory is never descended.
/// A symlink that resolves to a regular file counts as that file.
pub struct PathEnumerator<'a> {
    root: PathBuf,
    exclusions: &'a ExclusionSet,
    walker: walkdir::IntoIter,
}

impl<'a> PathEnumerator<'a> {
    /// Start enumerating `root`.
    ///
    /// Fails with [`VerifyError::Configuration`] if `root` is missing or not a
    /// directory.
    pub fn new(root: impl Into<PathBuf>, exclusions: &'a ExclusionSet) -> VerifyResult<Self> {
        let root = root.into();
        match std::fs::metadata(&root) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => {
                return Err(VerifyError::Configuration(format!(
                    "local root {} is not a directory",
                    root.display()
                )))
            }
            Err(e) => {
                return Err(VerifyError::Configuration(format!(
                    "local root {} is unreadable: {e}",
                    root.display()
                )))
            }
        }
        let walker = WalkDir::new(&root).follow_links(false).into_iter();
        Ok(Self {
            root,
            exclusions,
            walker,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drain the enumeration into the expected file set.
    pub fn collect_set(self) -> VerifyResult<BTreeSet<RelativePath>> {
        self.collect()
    }

    fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
        let file_type = entry.file_type();
        if file_type.is_file() {
            return true;
        }
        file_type.is_symlink()
            && std::fs::metadata(entry.path()).is_ok_and(|m| m.is_file())
    }
}

impl Iterator for PathEnumerator<'_> {
    type Item = VerifyResult<RelativePath>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    return Some(Err(VerifyError::LocalIo {
                        path,
                        source: io::Error::from(e),
                    }));
                }
            };
            if entry.depth() == 0 || !Self::is_regular_file(&entry) {
                continue;
            }
            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(relative) => relative,
                Err(e) => {
                    return Some(Err(VerifyError::LocalIo {
                        path: entry.path().to_path_buf(),
                        source: io::Error::other(e),
                    }))
                }
            };
            let path = match RelativePath::from_components(relative) {
                Ok(path) => path,
                Err(source) => {
                    return Some(Err(VerifyError::InvalidLocalPath {
                        path: entry.path().to_path_buf(),
                        source,
                    }))
                }
            };
            if self.exclusions.is_excluded(&path) {
                trace!(path = %path, "excluded local file");
                continue;
            }
            return Some(Ok(path));
        }
    }
}
