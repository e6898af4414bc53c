use std::sync::Arc;

use bytes::Bytes;
use rfv_store::ObjectStore;
use rfv_types::{KeyPrefix, RelativePath};
use tracing::trace;

use crate::error::{VerifyError, VerifyResult};

/// Result of fetching one remote object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(Bytes),
    /// No object exists at the key. This is a verification finding, not a
    /// fatal error.
    NotFound,
}

/// Retrieves the complete content of single remote objects.
#[derive(Clone)]
pub struct ContentFetcher {
    store: Arc<dyn ObjectStore>,
}

impl ContentFetcher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetch the object at `prefix + "/" + path`.
    pub async fn fetch(
        &self,
        bucket: &str,
        prefix: &KeyPrefix,
        path: &RelativePath,
    ) -> VerifyResult<FetchOutcome> {
        let key = prefix.key_for(path);
        match self.store.get_object(bucket, &key).await {
            Ok(data) => {
                trace!(bucket, key = %key, bytes = data.len(), "fetched object");
                Ok(FetchOutcome::Found(data))
            }
            Err(e) if e.is_not_found() => Ok(FetchOutcome::NotFound),
            Err(e) => Err(VerifyError::from_store(format!("fetching {bucket}/{key}"), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfv_store::InMemoryObjectStore;

    fn rp(s: &str) -> RelativePath {
        RelativePath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn fetches_by_joined_key() {
        let store = InMemoryObjectStore::new();
        store.put_object("bucket", "prefix/a/b.txt", "hi");
        let fetcher = ContentFetcher::new(Arc::new(store));
        let outcome = fetcher
            .fetch("bucket", &KeyPrefix::new("prefix/"), &rp("a/b.txt"))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Found(Bytes::from_static(b"hi")));
    }

    #[tokio::test]
    async fn missing_object_is_not_found_outcome() {
        let store = InMemoryObjectStore::new();
        store.create_bucket("bucket");
        let fetcher = ContentFetcher::new(Arc::new(store));
        let outcome = fetcher
            .fetch("bucket", &KeyPrefix::new("prefix"), &rp("a.txt"))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn transport_failure_is_fatal() {
        let store = InMemoryObjectStore::new();
        store.put_object("bucket", "prefix/a.txt", "hi");
        store.fail_key("prefix/a.txt");
        let fetcher = ContentFetcher::new(Arc::new(store));
        let err = fetcher
            .fetch("bucket", &KeyPrefix::new("prefix"), &rp("a.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Transport { .. }));
    }
}
