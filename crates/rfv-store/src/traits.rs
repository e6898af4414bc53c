use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StoreError, StoreResult};

/// A single listing request against one bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    /// Only keys starting with this string are returned.
    pub prefix: String,
    /// Token from the previous page, `None` for the first page.
    pub continuation_token: Option<String>,
    /// Upper bound on keys per page. Backends may return fewer.
    pub max_keys: Option<usize>,
}

impl ListRequest {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            continuation_token: None,
            max_keys: None,
        }
    }

    pub fn with_max_keys(mut self, max_keys: Option<usize>) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn with_continuation(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

/// Key and size of one listed object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    /// Present when the listing was truncated and more pages follow.
    pub next_continuation_token: Option<String>,
}

impl ListPage {
    pub fn is_truncated(&self) -> bool {
        self.next_continuation_token.is_some()
    }
}

/// Read-only, key-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Listings are exhaustive only when followed until a page carries no
///   continuation token.
/// - Keys within a listing are returned in ascending lexicographic order.
/// - Concurrent calls are always safe.
/// - A missing key is [`StoreError::NotFound`](crate::StoreError::NotFound);
///   all other failures are propagated, never silently ignored.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of keys under `request.prefix`.
    async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage>;

    /// Read the complete content of one object.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;
}

const TOKEN_TAG: &str = "after:";

/// Start-after pagination over a sorted key sequence.
///
/// Shared by the bundled backends: the continuation token encodes the last
/// key of the previous page.
pub(crate) fn paginate<I>(
    sorted: I,
    request: &ListRequest,
    default_page_size: usize,
) -> StoreResult<ListPage>
where
    I: IntoIterator<Item = ObjectSummary>,
{
    let page_size = request
        .max_keys
        .map_or(default_page_size, |m| m.min(default_page_size))
        .max(1);
    let start_after = match request.continuation_token.as_deref() {
        None => None,
        Some(token) => Some(
            token
                .strip_prefix(TOKEN_TAG)
                .ok_or_else(|| StoreError::InvalidContinuationToken(token.to_string()))?,
        ),
    };

    let mut remaining = sorted
        .into_iter()
        .filter(|o| o.key.starts_with(&request.prefix))
        .filter(|o| start_after.map_or(true, |after| o.key.as_str() > after))
        .peekable();

    let mut objects = Vec::new();
    while objects.len() < page_size {
        match remaining.next() {
            Some(o) => objects.push(o),
            None => break,
        }
    }

    let next_continuation_token = if remaining.peek().is_some() {
        objects.last().map(|o| format!("{TOKEN_TAG}{}", o.key))
    } else {
        None
    };

    Ok(ListPage {
        objects,
        next_continuation_token,
    })
}
