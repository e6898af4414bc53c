use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::memory::DEFAULT_PAGE_SIZE;
use crate::traits::{paginate, ListPage, ListRequest, ObjectStore, ObjectSummary};

/// Object store over a local directory tree.
///
/// Each subdirectory of `root` is a bucket and each regular file below a
/// bucket is an object whose key is its `/`-joined path relative to the
/// bucket directory. This is the layout of a synced or mounted bucket, and of
/// the data directory of simple S3-compatible test servers.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(StoreError::NoSuchBucket(bucket.to_string()));
        }
        let dir = self.root.join(bucket);
        if !dir.is_dir() {
            return Err(StoreError::NoSuchBucket(bucket.to_string()));
        }
        Ok(dir)
    }

    fn object_path(bucket_dir: &Path, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        let not_found = || StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };
        let mut path = bucket_dir.to_path_buf();
        for segment in key.split('/') {
            if !is_key_segment(segment) {
                return Err(not_found());
            }
            path.push(segment);
        }
        Ok(path)
    }
}

/// A key segment that maps to exactly one normal path component below the
/// bucket directory. Listing and reads both go through this rule.
fn is_key_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}

/// Collect every regular file under `bucket_dir` whose key starts with `prefix`.
fn scan_bucket(bucket_dir: &Path, prefix: &str) -> StoreResult<Vec<ObjectSummary>> {
    // Only the directory named by the prefix up to its last separator can
    // hold matching keys.
    let base = match prefix.rfind('/') {
        Some(idx) => {
            let dir = &prefix[..idx];
            if !dir.split('/').all(is_key_segment) {
                debug!(prefix, "prefix cannot name a directory in the bucket");
                return Ok(Vec::new());
            }
            bucket_dir.join(dir)
        }
        None => bucket_dir.to_path_buf(),
    };
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut objects = Vec::new();
    for entry in WalkDir::new(&base).follow_links(false) {
        let entry = entry.map_err(|e| StoreError::Io(io::Error::other(e)))?;
        let metadata = if entry.path_is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(m) => m,
                Err(_) => continue,
            }
        } else {
            entry.metadata().map_err(|e| StoreError::Io(io::Error::other(e)))?
        };
        if !metadata.is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(bucket_dir)
            .map_err(|e| StoreError::Io(io::Error::other(e)))?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component.as_os_str().to_str() {
                Some(s) => segments.push(s),
                None => {
                    warn!(path = %entry.path().display(), "skipping object with non-UTF-8 key");
                    segments.clear();
                    break;
                }
            }
        }
        if segments.is_empty() {
            continue;
        }
        let key = segments.join("/");
        if key.starts_with(prefix) {
            objects.push(ObjectSummary {
                key,
                size: metadata.len(),
            });
        }
    }
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage> {
        let bucket_dir = self.bucket_dir(&request.bucket)?;
        let prefix = request.prefix.clone();
        let objects = tokio::task::spawn_blocking(move || scan_bucket(&bucket_dir, &prefix))
            .await
            .map_err(|e| StoreError::Transport(format!("listing task failed: {e}")))??;
        debug!(
            bucket = %request.bucket,
            prefix = %request.prefix,
            matched = objects.len(),
            "scanned bucket directory"
        );
        paginate(objects, request, self.page_size)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let bucket_dir = self.bucket_dir(bucket)?;
        let path = Self::object_path(&bucket_dir, bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound || path.is_dir() => {
                Err(StoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
