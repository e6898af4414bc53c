use std::fmt;
use std::path::PathBuf;

use rfv_crypto::{DigestAlgorithm, DigestPair};
use rfv_types::{KeyPrefix, RelativePath};
use serde::{Deserialize, Serialize};

/// Final pass/fail outcome of a verification run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail => f.write_str("FAIL"),
        }
    }
}

/// A file present on both sides whose digests differ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMismatch {
    pub path: RelativePath,
    /// Full remote key the content was read from.
    pub key: String,
    pub digests: DigestPair,
    pub remote_size: u64,
    /// Leading remote bytes, decoded as lossy UTF-8, for manual diagnosis.
    pub remote_preview: Option<String>,
    pub preview_truncated: bool,
}

/// Everything a verification run found.
///
/// All lists are sorted by [`RelativePath`] so output is reproducible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub local_root: PathBuf,
    pub bucket: String,
    pub prefix: KeyPrefix,
    pub algorithm: DigestAlgorithm,
    pub expected_count: usize,
    pub actual_count: usize,
    /// Local files with no remote object.
    pub missing_remotely: Vec<RelativePath>,
    /// Remote objects with no local file.
    pub unexpected_remotely: Vec<RelativePath>,
    /// Listed remotely but gone by the time they were fetched.
    pub vanished: Vec<RelativePath>,
    pub content_mismatches: Vec<ContentMismatch>,
    pub files_compared: usize,
    pub elapsed_ms: u64,
}

impl VerificationReport {
    pub fn has_structural_mismatches(&self) -> bool {
        !self.missing_remotely.is_empty() || !self.unexpected_remotely.is_empty()
    }

    /// Objects that were listed but could not be read back (`vanished`) count
    /// as content failures alongside digest mismatches.
    pub fn has_content_mismatches(&self) -> bool {
        !self.content_mismatches.is_empty() || !self.vanished.is_empty()
    }

    /// `true` only if the file sets matched exactly and every shared file's
    /// digests matched.
    pub fn is_success(&self) -> bool {
        !self.has_structural_mismatches() && !self.has_content_mismatches()
    }

    pub fn verdict(&self) -> Verdict {
        if self.is_success() {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Total number of recorded mismatches of every kind.
    pub fn mismatch_count(&self) -> usize {
        self.missing_remotely.len()
            + self.unexpected_remotely.len()
            + self.vanished.len()
            + self.content_mismatches.len()
    }

    fn location(&self) -> String {
        if self.prefix.is_root() {
            self.bucket.clone()
        } else {
            format!("{}/{}", self.bucket, self.prefix)
        }
    }
}

fn write_paths(f: &mut fmt::Formatter<'_>, title: &str, paths: &[RelativePath]) -> fmt::Result {
    if paths.is_empty() {
        return Ok(());
    }
    writeln!(f, "  {title} ({}):", paths.len())?;
    for path in paths {
        writeln!(f, "    - {path}")?;
    }
    Ok(())
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} against {}",
            self.verdict(),
            self.location(),
            self.local_root.display()
        )?;
        writeln!(
            f,
            "  {} local files, {} remote objects, {} compared ({}) in {} ms",
            self.expected_count,
            self.actual_count,
            self.files_compared,
            self.algorithm,
            self.elapsed_ms
        )?;
        write_paths(f, "missing remotely", &self.missing_remotely)?;
        write_paths(f, "unexpected remotely", &self.unexpected_remotely)?;
        write_paths(f, "vanished before fetch", &self.vanished)?;
        if !self.content_mismatches.is_empty() {
            writeln!(f, "  content mismatches ({}):", self.content_mismatches.len())?;
            for m in &self.content_mismatches {
                writeln!(
                    f,
                    "    - {} (key {}, {} bytes): expected {}, actual {}",
                    m.path, m.key, m.remote_size, m.digests.expected, m.digests.actual
                )?;
                if let Some(preview) = &m.remote_preview {
                    let suffix = if m.preview_truncated { " (truncated)" } else { "" };
                    writeln!(f, "      remote content{suffix}:")?;
                    for line in preview.lines() {
                        writeln!(f, "      | {line}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Leading bytes of remote content for a mismatch entry.
pub(crate) fn preview(data: &[u8], limit: usize) -> (Option<String>, bool) {
    if limit == 0 {
        return (None, !data.is_empty());
    }
    let end = data.len().min(limit);
    (
        Some(String::from_utf8_lossy(&data[..end]).into_owned()),
        data.len() > limit,
    )
}
