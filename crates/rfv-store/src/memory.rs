use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StoreError, StoreResult};
use crate::traits::{paginate, ListPage, ListRequest, ObjectStore, ObjectSummary};

/// Default number of keys returned per listing page, matching common
/// S3-compatible servers.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// In-memory, `BTreeMap`-based object store.
///
/// Intended for tests and embedding. Buckets and objects are held behind a
/// `RwLock`; object bodies are `Bytes`, so reads are cheap clones. The page
/// size is configurable to exercise truncated listings, and individual keys
/// or the whole listing can be made to fail with a transport error.
pub struct InMemoryObjectStore {
    buckets: RwLock<BTreeMap<String, BTreeMap<String, Bytes>>>,
    page_size: usize,
    failing_keys: RwLock<BTreeSet<String>>,
    fail_listing: AtomicBool,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    /// Create a new empty store with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a new empty store returning at most `page_size` keys per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            failing_keys: RwLock::new(BTreeSet::new()),
            fail_listing: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Create a bucket if it does not exist yet.
    pub fn create_bucket(&self, bucket: &str) {
        self.buckets
            .write()
            .expect("lock poisoned")
            .entry(bucket.to_string())
            .or_default();
    }

    /// Store an object, creating the bucket on demand.
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.buckets
            .write()
            .expect("lock poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    /// Remove an object. Returns `true` if it existed.
    pub fn remove_object(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .write()
            .expect("lock poisoned")
            .get_mut(bucket)
            .is_some_and(|objects| objects.remove(key).is_some())
    }

    /// Number of objects in a bucket.
    pub fn len(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .map_or(0, BTreeMap::len)
    }

    /// Make reads of `key` fail with a transport error.
    pub fn fail_key(&self, key: &str) {
        self.failing_keys
            .write()
            .expect("lock poisoned")
            .insert(key.to_string());
    }

    /// Make every listing call fail with a transport error.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Number of `list_objects` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_object` calls served so far.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StoreError::Transport(format!(
                "injected listing failure for bucket {}",
                request.bucket
            )));
        }
        let buckets = self.buckets.read().expect("lock poisoned");
        let objects = buckets
            .get(&request.bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(request.bucket.clone()))?;
        let summaries = objects.iter().map(|(key, data)| ObjectSummary {
            key: key.clone(),
            size: data.len() as u64,
        });
        paginate(summaries, request, self.page_size)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_keys.read().expect("lock poisoned").contains(key) {
            return Err(StoreError::Transport(format!(
                "injected read failure for {bucket}/{key}"
            )));
        }
        let buckets = self.buckets.read().expect("lock poisoned");
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        objects.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bucket_count = self.buckets.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryObjectStore")
            .field("bucket_count", &bucket_count)
            .field("page_size", &self.page_size)
            .finish()
    }
}
