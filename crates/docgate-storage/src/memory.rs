use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use docgate_common::error::{BackendError, BackendResult};
use docgate_common::time;
use docgate_common::types::{Listing, ObjectMeta};
use futures::StreamExt;
use md5::{Digest, Md5};

use crate::traits::{ByteStream, ObjectBody, ObjectStore};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Head,
    Get,
    Put,
    Copy,
    Delete,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn meta(&self, key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: self.data.len() as u64,
            etag: Some(self.etag.clone()),
            content_type: self.content_type.clone(),
            last_modified: self.last_modified,
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing: HashSet<Operation>,
    delay: Option<Duration>,
}

/// Process-local object store.
///
/// Serves local development and tests; operations can be made to fail or
/// stall, and every call is counted.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    faults: RwLock<Faults>,
    calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backend calls served so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `operation` fail with `BackendError::Unavailable`.
    pub fn fail(&self, operation: Operation) {
        if let Ok(mut faults) = self.faults.write() {
            faults.failing.insert(operation);
        }
    }

    /// Stalls every subsequent call by `delay`.
    pub fn delay(&self, delay: Duration) {
        if let Ok(mut faults) = self.faults.write() {
            faults.delay = Some(delay);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.write() {
            *faults = Faults::default();
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn enter(&self, operation: Operation) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (failing, delay) = {
            let faults = self.faults.read().map_err(|_| poisoned())?;
            (faults.failing.contains(&operation), faults.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(BackendError::Unavailable(format!(
                "injected {operation:?} failure"
            )));
        }
        Ok(())
    }

    fn stored(&self, key: &str) -> BackendResult<StoredObject> {
        self.objects
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::not_found(key))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Listing> {
        self.enter(Operation::List).await?;
        let objects = self.objects.read().map_err(|_| poisoned())?;

        let mut listing = Listing::default();
        let mut prefixes = BTreeSet::new();
        for (key, object) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match delimiter.and_then(|delimiter| rest.find(delimiter).map(|idx| (idx, delimiter))) {
                Some((idx, delimiter)) => {
                    prefixes.insert(format!("{prefix}{}", &rest[..idx + delimiter.len_utf8()]));
                }
                None => listing.objects.push(object.meta(key)),
            }
        }
        listing.prefixes = prefixes.into_iter().collect();
        Ok(listing)
    }

    async fn head(&self, key: &str) -> BackendResult<ObjectMeta> {
        self.enter(Operation::Head).await?;
        Ok(self.stored(key)?.meta(key))
    }

    async fn get(&self, key: &str) -> BackendResult<ObjectBody> {
        self.enter(Operation::Get).await?;
        let object = self.stored(key)?;
        let meta = object.meta(key);
        let data = object.data;
        let chunks = (0..data.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
            .collect::<Vec<_>>();
        Ok(ObjectBody {
            meta,
            body: futures::stream::iter(chunks).boxed(),
        })
    }

    async fn put(
        &self,
        key: &str,
        mut body: ByteStream,
        content_type: Option<&str>,
    ) -> BackendResult<ObjectMeta> {
        self.enter(Operation::Put).await?;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }

        let data = buffer.freeze();
        let object = StoredObject {
            etag: format!("{:x}", Md5::digest(&data)),
            data,
            content_type: content_type.map(str::to_string),
            last_modified: time::now(),
        };
        let meta = object.meta(key);
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), object);
        Ok(meta)
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> BackendResult<()> {
        self.enter(Operation::Copy).await?;
        let mut object = self.stored(src_key)?;
        object.last_modified = time::now();
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .insert(dst_key.to_string(), object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.enter(Operation::Delete).await?;
        self.objects.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}

fn poisoned() -> BackendError {
    BackendError::Unavailable("memory store lock poisoned".to_string())
}
