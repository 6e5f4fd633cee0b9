use async_trait::async_trait;
use bytes::Bytes;
use docgate_common::error::BackendResult;
use docgate_common::types::{Listing, ObjectMeta};
use futures::stream::BoxStream;

pub type ByteStream = BoxStream<'static, BackendResult<Bytes>>;

pub struct ObjectBody {
    pub meta: ObjectMeta,
    pub body: ByteStream,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Flat key-addressed object storage.
///
/// Keys are opaque to implementations; `/` only has meaning as the optional
/// listing delimiter.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists every object whose key starts with `prefix`. With a delimiter,
    /// keys containing it after the prefix are folded into `Listing::prefixes`.
    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Listing>;
    async fn head(&self, key: &str) -> BackendResult<ObjectMeta>;
    async fn get(&self, key: &str) -> BackendResult<ObjectBody>;
    /// Writes the whole stream under `key`, replacing any existing object.
    /// Nothing is committed unless the stream was read to its end.
    async fn put(
        &self,
        key: &str,
        body: ByteStream,
        content_type: Option<&str>,
    ) -> BackendResult<ObjectMeta>;
    async fn copy(&self, src_key: &str, dst_key: &str) -> BackendResult<()>;
    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> BackendResult<()>;
}
