use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// The canonical path separator for both local and remote paths.
pub const SEPARATOR: char = '/';

/// A normalized, `/`-separated path identifying a file relative to a local
/// root or a remote key prefix.
///
/// A `RelativePath` never starts or ends with a separator, never contains
/// empty segments, and never contains `.` or `..` segments. Two backends that
/// hold the same logical file must produce byte-identical `RelativePath`s.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Parse and validate a `/`-separated relative path.
    pub fn parse(s: impl Into<String>) -> TypeResult<Self> {
        let s = s.into();
        validate(&s)?;
        Ok(Self(s))
    }

    /// Build a path from the components of a host-relative [`Path`].
    ///
    /// Host separators are replaced by [`SEPARATOR`]. Only normal components
    /// are accepted; roots, prefixes, `.` and `..` are rejected.
    pub fn from_components(path: &Path) -> TypeResult<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment.to_str().ok_or_else(|| TypeError::InvalidPath {
                        path: path.to_string_lossy().into_owned(),
                        reason: "not valid UTF-8",
                    })?;
                    segments.push(segment);
                }
                _ => {
                    return Err(TypeError::InvalidPath {
                        path: path.to_string_lossy().into_owned(),
                        reason: "contains a non-normal component",
                    })
                }
            }
        }
        let separator = SEPARATOR.to_string();
        Self::parse(segments.join(separator.as_str()))
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final segment of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// Iterate over the path's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Resolve this path against a local root directory.
    pub fn to_local_path(&self, root: &Path) -> std::path::PathBuf {
        let mut out = root.to_path_buf();
        out.extend(self.segments());
        out
    }
}

fn validate(s: &str) -> TypeResult<()> {
    let invalid = |reason| TypeError::InvalidPath {
        path: s.to_string(),
        reason,
    };
    if s.is_empty() {
        return Err(invalid("empty"));
    }
    if s.starts_with(SEPARATOR) {
        return Err(invalid("leading separator"));
    }
    if s.ends_with(SEPARATOR) {
        return Err(invalid("trailing separator"));
    }
    for segment in s.split(SEPARATOR) {
        match segment {
            "" => return Err(invalid("empty segment")),
            "." | ".." => return Err(invalid("dot segment")),
            _ => {}
        }
    }
    Ok(())
}

impl fmt::Debug for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelativePath({:?})", self.0)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RelativePath {
    type Error = TypeError;

    fn try_from(s: String) -> TypeResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = TypeError;

    fn try_from(s: &str) -> TypeResult<Self> {
        Self::parse(s)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

/// A remote key prefix under which a repository copy lives.
///
/// Trailing separators are trimmed on construction, so `"repo"` and `"repo/"`
/// name the same prefix. An empty prefix denotes the bucket root.
///
/// `KeyPrefix` is the only place remote keys are turned into
/// [`RelativePath`]s: see [`KeyPrefix::strip`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self(prefix.trim_end_matches(SEPARATOR).to_string())
    }

    /// The bucket root.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The prefix to hand to a listing call: `prefix + "/"`, or `""` at the root.
    ///
    /// Listing with the trailing separator keeps sibling prefixes such as
    /// `repo-old/` out of the result set for prefix `repo`.
    pub fn listing_prefix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}{}", self.0, SEPARATOR)
        }
    }

    /// The full object key for a relative path under this prefix.
    pub fn key_for(&self, path: &RelativePath) -> String {
        format!("{}{}", self.listing_prefix(), path.as_str())
    }

    /// Strip this prefix from a full object key.
    ///
    /// The key must start with `prefix + "/"` on an exact separator boundary.
    /// Keys ending in a separator are directory markers and are reported as
    /// [`TypeError::DirectoryMarker`].
    pub fn strip(&self, key: &str) -> TypeResult<RelativePath> {
        let rest = if self.is_root() {
            Some(key)
        } else {
            key.strip_prefix(self.0.as_str())
                .and_then(|r| r.strip_prefix(SEPARATOR))
        };
        let rest = rest.ok_or_else(|| TypeError::KeyOutsidePrefix {
            key: key.to_string(),
            prefix: self.0.clone(),
        })?;
        if rest.is_empty() || rest.ends_with(SEPARATOR) {
            return Err(TypeError::DirectoryMarker(key.to_string()));
        }
        RelativePath::parse(rest)
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for KeyPrefix {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for KeyPrefix {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<KeyPrefix> for String {
    fn from(prefix: KeyPrefix) -> Self {
        prefix.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_accepts_nested_paths() {
        let p = RelativePath::parse("v1/content/a.txt").unwrap();
        assert_eq!(p.as_str(), "v1/content/a.txt");
        assert_eq!(p.file_name(), "a.txt");
        assert_eq!(p.segments().count(), 3);
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        for bad in ["", "/a", "a/", "a//b", "./a", "a/../b", ".."] {
            assert!(RelativePath::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn from_components_normalizes_separators() {
        let local = Path::new("a").join("b").join("c.txt");
        let p = RelativePath::from_components(&local).unwrap();
        assert_eq!(p.as_str(), "a/b/c.txt");
    }

    #[test]
    fn from_components_rejects_parent_dir() {
        assert!(RelativePath::from_components(Path::new("../a")).is_err());
    }

    #[test]
    fn to_local_path_joins_segments() {
        let p = RelativePath::parse("x/y.txt").unwrap();
        assert_eq!(p.to_local_path(Path::new("/root")), Path::new("/root/x/y.txt"));
    }

    #[test]
    fn relative_path_serde_validates() {
        let ok: RelativePath = serde_json::from_str("\"a/b\"").unwrap();
        assert_eq!(ok.as_str(), "a/b");
        assert!(serde_json::from_str::<RelativePath>("\"/a\"").is_err());
    }

    #[test]
    fn prefix_trims_trailing_separator() {
        assert_eq!(KeyPrefix::new("repo/"), KeyPrefix::new("repo"));
        assert_eq!(KeyPrefix::new("repo//").as_str(), "repo");
        assert!(KeyPrefix::new("/").is_root());
    }

    #[test]
    fn strip_prefix_yields_relative_path() {
        let prefix = KeyPrefix::new("prefix");
        let p = prefix.strip("prefix/a/b.txt").unwrap();
        assert_eq!(p.as_str(), "a/b.txt");
        let local = RelativePath::from_components(&Path::new("a").join("b.txt")).unwrap();
        assert_eq!(p, local);
    }

    #[test]
    fn strip_requires_separator_boundary() {
        let prefix = KeyPrefix::new("repo");
        assert!(matches!(
            prefix.strip("repository/a.txt"),
            Err(TypeError::KeyOutsidePrefix { .. })
        ));
        assert!(matches!(
            prefix.strip("repo"),
            Err(TypeError::KeyOutsidePrefix { .. })
        ));
        assert!(matches!(
            prefix.strip("other/a.txt"),
            Err(TypeError::KeyOutsidePrefix { .. })
        ));
    }

    #[test]
    fn strip_reports_directory_markers() {
        let prefix = KeyPrefix::new("repo");
        assert!(matches!(prefix.strip("repo/"), Err(TypeError::DirectoryMarker(_))));
        assert!(matches!(prefix.strip("repo/v1/"), Err(TypeError::DirectoryMarker(_))));
    }

    #[test]
    fn strip_rejects_double_separator() {
        let prefix = KeyPrefix::new("repo");
        assert!(matches!(
            prefix.strip("repo//a.txt"),
            Err(TypeError::InvalidPath { .. })
        ));
    }

    #[test]
    fn root_prefix_passes_keys_through() {
        let root = KeyPrefix::root();
        assert_eq!(root.listing_prefix(), "");
        assert_eq!(root.strip("a/b.txt").unwrap().as_str(), "a/b.txt");
        let p = RelativePath::parse("a.txt").unwrap();
        assert_eq!(root.key_for(&p), "a.txt");
    }

    #[test]
    fn key_for_joins_with_separator() {
        let p = RelativePath::parse("a/b.txt").unwrap();
        assert_eq!(KeyPrefix::new("prefix/").key_for(&p), "prefix/a/b.txt");
    }

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_=-][A-Za-z0-9_.=-]{0,11}".prop_filter("dot segment", |s| s != "." && s != "..")
    }

    proptest! {
        #[test]
        fn strip_inverts_key_for(
            prefix in proptest::collection::vec(segment(), 0..3),
            path in proptest::collection::vec(segment(), 1..5),
        ) {
            let prefix = KeyPrefix::new(prefix.join("/"));
            let path = RelativePath::parse(path.join("/")).unwrap();
            let key = prefix.key_for(&path);
            prop_assert_eq!(prefix.strip(&key).unwrap(), path);
        }

        #[test]
        fn local_and_remote_normalization_agree(path in proptest::collection::vec(segment(), 1..5)) {
            let mut local = std::path::PathBuf::new();
            local.extend(&path);
            let from_local = RelativePath::from_components(&local).unwrap();
            let from_remote = KeyPrefix::new("prefix").strip(&format!("prefix/{}", path.join("/"))).unwrap();
            prop_assert_eq!(from_local, from_remote);
        }
    }
}
