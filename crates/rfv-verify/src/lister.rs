use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use rfv_store::{ListRequest, ObjectStore, StoreError};
use rfv_types::{ExclusionSet, KeyPrefix, RelativePath, TypeError};
use tracing::{debug, trace, warn};

use crate::error::{VerifyError, VerifyResult};

/// Lists every object under a key prefix as [`RelativePath`]s.
///
/// Continuation tokens are followed until the store reports the last page;
/// a single listing call would silently under-report large repositories.
/// Keys are normalized through [`KeyPrefix::strip`] only.
#[derive(Clone)]
pub struct ObjectLister {
    store: Arc<dyn ObjectStore>,
    page_size: Option<usize>,
}

impl ObjectLister {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            page_size: None,
        }
    }

    /// Request at most `page_size` keys per listing call.
    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Build the actual object set for `bucket` under `prefix`.
    pub async fn list(
        &self,
        bucket: &str,
        prefix: &KeyPrefix,
        exclusions: &ExclusionSet,
    ) -> VerifyResult<BTreeSet<RelativePath>> {
        let mut request =
            ListRequest::new(bucket, prefix.listing_prefix()).with_max_keys(self.page_size);
        let mut seen_tokens = HashSet::new();
        let mut paths = BTreeSet::new();
        let mut pages = 0usize;
        let mut skipped = 0usize;

        loop {
            let page = self
                .store
                .list_objects(&request)
                .await
                .map_err(|e| VerifyError::from_store(format!("listing {bucket}/{prefix}"), e))?;
            pages += 1;

            for object in page.objects {
                let path = match prefix.strip(&object.key) {
                    Ok(path) => path,
                    Err(TypeError::DirectoryMarker(key)) => {
                        trace!(key = %key, "skipping directory marker");
                        continue;
                    }
                    Err(source) => {
                        return Err(VerifyError::InvalidKey {
                            key: object.key,
                            source,
                        })
                    }
                };
                if exclusions.is_excluded(&path) {
                    trace!(path = %path, "excluded remote object");
                    skipped += 1;
                    continue;
                }
                if !paths.insert(path) {
                    warn!(key = %object.key, "listing returned a key twice");
                }
            }

            match page.next_continuation_token {
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(VerifyError::Transport {
                            operation: format!("listing {bucket}/{prefix}"),
                            source: StoreError::Transport(format!(
                                "continuation token {token:?} repeated; listing does not advance"
                            )),
                        });
                    }
                    request = request.with_continuation(Some(token));
                }
                None => break,
            }
        }

        debug!(
            bucket,
            prefix = %prefix,
            pages,
            objects = paths.len(),
            excluded = skipped,
            "listed remote objects"
        );
        Ok(paths)
    }
}
