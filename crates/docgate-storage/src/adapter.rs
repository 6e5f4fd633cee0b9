//! File-manager operations expressed as calls against an [`ObjectStore`].
//!
//! Directories are key prefixes ending in `/`; an empty object at the prefix
//! itself acts as the directory marker. Every backend call runs under the
//! configured deadline.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use docgate_common::error::{BackendError, BackendResult, GatewayError, Result};
use docgate_common::key::{KeyMapper, ObjectKey, validate_name};
use docgate_common::time;
use docgate_common::types::{FileEntry, ItemDetails, Listing, ObjectMeta, extension_of};
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::pattern::SearchPattern;
use crate::traits::{ByteStream, ObjectBody, ObjectStore};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
const MAX_CONCURRENT_CALLS: usize = 16;
const MAX_RENAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone)]
pub struct DirectoryListing {
    pub cwd: FileEntry,
    pub files: Vec<FileEntry>,
}

/// Outcome of a copy or move: the items written plus the names skipped
/// because the destination already held them.
#[derive(Debug, Clone, Default)]
pub struct TransferReport {
    pub files: Vec<FileEntry>,
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone)]
enum Item {
    File { key: ObjectKey, meta: ObjectMeta },
    Directory { key: ObjectKey },
}

impl Item {
    fn key(&self) -> &ObjectKey {
        match self {
            Self::File { key, .. } | Self::Directory { key } => key,
        }
    }

    fn name(&self) -> &str {
        self.key().name()
    }

    fn is_directory(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}

#[derive(Clone)]
pub struct DocumentStore {
    store: Arc<dyn ObjectStore>,
    keys: KeyMapper,
    deadline: Duration,
}

impl DocumentStore {
    pub fn new(store: Arc<dyn ObjectStore>, keys: KeyMapper, deadline: Duration) -> Self {
        Self {
            store,
            keys,
            deadline,
        }
    }

    pub fn keys(&self) -> &KeyMapper {
        &self.keys
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Lists one directory level.
    pub async fn list(&self, dir: &ObjectKey, include_hidden: bool) -> Result<DirectoryListing> {
        let listing = self.call(self.store.list(dir.as_str(), Some('/'))).await?;
        if !self.is_root(dir) && listing.objects.is_empty() && listing.prefixes.is_empty() {
            return Err(GatewayError::NotFound(self.keys.virtual_path(dir)));
        }

        let cwd = self.directory_entry(dir, marker_time(&listing, dir), !listing.prefixes.is_empty());
        let filter_path = self.keys.virtual_path(dir);
        let children = listing
            .prefixes
            .iter()
            .filter_map(|prefix| self.keys.adopt(prefix))
            .filter(|child| child.is_directory() && child != dir)
            .collect::<Vec<_>>();
        let child_listings = futures::stream::iter(children.iter().cloned())
            .map(|child| async move {
                self.call(self.store.list(child.as_str(), Some('/'))).await
            })
            .buffered(MAX_CONCURRENT_CALLS)
            .try_collect::<Vec<_>>()
            .await?;

        let mut files = Vec::with_capacity(children.len() + listing.objects.len());
        for (child, below) in children.iter().zip(child_listings) {
            files.push(FileEntry::directory(
                child.name(),
                filter_path.clone(),
                marker_time(&below, child),
                !below.prefixes.is_empty(),
            ));
        }
        for meta in &listing.objects {
            let Some(key) = self.keys.adopt(&meta.key) else {
                debug!(key = %meta.key, "skipping object outside the key space");
                continue;
            };
            if key.is_directory() {
                continue;
            }
            files.push(FileEntry::file(key.name(), filter_path.clone(), meta));
        }

        files.retain(|entry| include_hidden || !entry.is_hidden());
        sort_entries(&mut files);
        Ok(DirectoryListing { cwd, files })
    }

    /// Creates an empty directory named `name` inside `dir`.
    pub async fn create_directory(&self, dir: &ObjectKey, name: &str) -> Result<FileEntry> {
        let name = validate_name(name)?;
        if self.resolve(dir, name).await?.is_some() {
            return Err(GatewayError::AlreadyExists(name.to_string()));
        }

        let key = dir.join(&format!("{name}/"))?;
        let meta = self
            .call(self.store.put(key.as_str(), futures::stream::empty().boxed(), None))
            .await?;
        Ok(FileEntry::directory(
            name,
            self.keys.virtual_path(dir),
            meta.last_modified,
            false,
        ))
    }

    /// Deletes files and whole directories. Any failed key fails the call as a
    /// whole without telling which keys are gone.
    pub async fn delete(&self, dir: &ObjectKey, names: &[String]) -> Result<Vec<FileEntry>> {
        let mut items = Vec::with_capacity(names.len());
        for name in names {
            items.push(self.require(dir, name).await?);
        }

        let filter_path = self.keys.virtual_path(dir);
        let mut targets = Vec::new();
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Item::File { key, meta } => {
                    entries.push(FileEntry::file(key.name(), filter_path.clone(), &meta));
                    targets.push(key);
                }
                Item::Directory { key } => {
                    let below = self.objects_below(&key).await?;
                    let has_child = has_subdirectory(&key, &below);
                    entries.push(FileEntry::directory(
                        key.name(),
                        filter_path.clone(),
                        time::now(),
                        has_child,
                    ));
                    targets.extend(below.into_iter().map(|(key, _)| key));
                }
            }
        }

        let total = targets.len();
        let failed = self.delete_keys(targets).await;
        if failed > 0 {
            return Err(BackendError::PartialDelete { failed, total }.into());
        }
        Ok(entries)
    }

    pub async fn copy(
        &self,
        dir: &ObjectKey,
        names: &[String],
        target: &ObjectKey,
        rename_files: &[String],
    ) -> Result<TransferReport> {
        self.transfer(dir, names, target, rename_files, false).await
    }

    /// Copy followed by deletion of the sources. A failed deletion leaves the
    /// item in both places and is only logged.
    pub async fn move_items(
        &self,
        dir: &ObjectKey,
        names: &[String],
        target: &ObjectKey,
        rename_files: &[String],
    ) -> Result<TransferReport> {
        self.transfer(dir, names, target, rename_files, true).await
    }

    pub async fn rename(&self, dir: &ObjectKey, name: &str, new_name: &str) -> Result<FileEntry> {
        let new_name = validate_name(new_name)?;
        let item = self.require(dir, name).await?;
        if self.resolve(dir, new_name).await?.is_some() {
            return Err(GatewayError::AlreadyExists(new_name.to_string()));
        }
        self.relocate(&item, dir, new_name, true).await
    }

    /// Recursive, gateway-side name search below `dir`.
    pub async fn search(
        &self,
        dir: &ObjectKey,
        search: &str,
        case_sensitive: bool,
        include_hidden: bool,
    ) -> Result<DirectoryListing> {
        let listing = self.call(self.store.list(dir.as_str(), None)).await?;
        let pattern = SearchPattern::new(search, case_sensitive);

        let mut directories: BTreeMap<ObjectKey, DateTime<Utc>> = BTreeMap::new();
        let mut files = Vec::new();
        for meta in &listing.objects {
            let Some(key) = self.keys.adopt(&meta.key) else {
                continue;
            };
            let Some(relative) = key.relative_to(dir) else {
                continue;
            };
            if !include_hidden && relative.split('/').any(|segment| segment.starts_with('.')) {
                continue;
            }

            let segments = relative.split('/').collect::<Vec<_>>();
            let mut current = dir.clone();
            for segment in &segments[..segments.len().saturating_sub(1)] {
                current = current.join(&format!("{segment}/"))?;
                let modified = directories.entry(current.clone()).or_insert(meta.last_modified);
                if current == key {
                    *modified = meta.last_modified;
                }
            }

            if !key.is_directory() && pattern.matches(key.name()) {
                files.push(FileEntry::file(key.name(), self.keys.parent_path(&key), meta));
            }
        }

        for (key, modified) in &directories {
            if !pattern.matches(key.name()) {
                continue;
            }
            let has_child = directories
                .keys()
                .any(|other| other != key && other.is_within(key));
            files.push(FileEntry::directory(
                key.name(),
                self.keys.parent_path(key),
                *modified,
                has_child,
            ));
        }

        files.retain(|entry| include_hidden || !entry.is_hidden());
        sort_entries(&mut files);
        let cwd = self.directory_entry(dir, marker_time(&listing, dir), !directories.is_empty());
        Ok(DirectoryListing { cwd, files })
    }

    /// Metadata of one or more items, or of `dir` itself when `names` is
    /// empty; no object body is read.
    pub async fn details(&self, dir: &ObjectKey, names: &[String]) -> Result<ItemDetails> {
        if names.is_empty() {
            return self.directory_details(dir).await;
        }

        let mut items = Vec::with_capacity(names.len());
        for name in names {
            items.push(self.require(dir, name).await?);
        }

        if let [item] = items.as_slice() {
            let (size, modified) = self.measure(item).await?;
            return Ok(ItemDetails {
                name: item.name().to_string(),
                location: self.keys.virtual_path(item.key()),
                size,
                modified,
                created: modified,
                is_file: !item.is_directory(),
                multiple_files: false,
            });
        }

        let mut size = 0;
        for item in &items {
            size += self.measure(item).await?.0;
        }
        Ok(ItemDetails {
            name: names.join(", "),
            location: self.keys.virtual_path(dir),
            size,
            modified: None,
            created: None,
            is_file: false,
            multiple_files: true,
        })
    }

    async fn directory_details(&self, dir: &ObjectKey) -> Result<ItemDetails> {
        let below = self.objects_below(dir).await?;
        if below.is_empty() && !self.is_root(dir) {
            return Err(GatewayError::NotFound(self.keys.virtual_path(dir)));
        }
        let name = if self.is_root(dir) {
            self.keys.root()
        } else {
            dir.name()
        };
        let modified = below.iter().map(|(_, meta)| meta.last_modified).max();
        Ok(ItemDetails {
            name: name.to_string(),
            location: self.keys.virtual_path(dir),
            size: below.iter().map(|(_, meta)| meta.size).sum(),
            modified,
            created: modified,
            is_file: false,
            multiple_files: false,
        })
    }

    /// Opens an object for streaming. Only the call that returns the object
    /// headers runs under the deadline.
    pub async fn open(&self, key: &ObjectKey) -> BackendResult<ObjectBody> {
        if key.is_directory() {
            return Err(BackendError::not_found(key.as_str()));
        }
        self.call(self.store.get(key.as_str())).await
    }

    /// Writes a whole object from `body`, overwriting what is there.
    pub async fn write(
        &self,
        key: &ObjectKey,
        body: ByteStream,
        content_type: Option<&str>,
    ) -> BackendResult<ObjectMeta> {
        self.store.put(key.as_str(), body, content_type).await
    }

    /// Cheap reachability check used by readiness checks.
    pub async fn ping(&self) -> BackendResult<()> {
        let root = self.keys.root_directory();
        self.call(self.store.list(root.as_str(), Some('/'))).await?;
        Ok(())
    }

    async fn call<T>(&self, operation: impl Future<Output = BackendResult<T>>) -> BackendResult<T> {
        match tokio::time::timeout(self.deadline, operation).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.deadline)),
        }
    }

    fn is_root(&self, dir: &ObjectKey) -> bool {
        *dir == self.keys.root_directory()
    }

    fn directory_entry(&self, dir: &ObjectKey, modified: DateTime<Utc>, has_child: bool) -> FileEntry {
        if self.is_root(dir) {
            FileEntry::directory(self.keys.root(), "", modified, has_child)
        } else {
            FileEntry::directory(dir.name(), self.keys.parent_path(dir), modified, has_child)
        }
    }

    async fn resolve(&self, dir: &ObjectKey, name: &str) -> Result<Option<Item>> {
        let name = validate_name(name)?;
        let file_key = dir.join(name)?;
        match self.call(self.store.head(file_key.as_str())).await {
            Ok(meta) => return Ok(Some(Item::File { key: file_key, meta })),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let dir_key = dir.join(&format!("{name}/"))?;
        let listing = self.call(self.store.list(dir_key.as_str(), Some('/'))).await?;
        if listing.objects.is_empty() && listing.prefixes.is_empty() {
            return Ok(None);
        }
        Ok(Some(Item::Directory { key: dir_key }))
    }

    async fn require(&self, dir: &ObjectKey, name: &str) -> Result<Item> {
        self.resolve(dir, name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(name.to_string()))
    }

    /// Every object below a directory, its marker included.
    async fn objects_below(&self, dir: &ObjectKey) -> Result<Vec<(ObjectKey, ObjectMeta)>> {
        let listing = self.call(self.store.list(dir.as_str(), None)).await?;
        Ok(listing
            .objects
            .into_iter()
            .filter_map(|meta| self.keys.adopt(&meta.key).map(|key| (key, meta)))
            .collect())
    }

    async fn measure(&self, item: &Item) -> Result<(u64, Option<DateTime<Utc>>)> {
        match item {
            Item::File { meta, .. } => Ok((meta.size, Some(meta.last_modified))),
            Item::Directory { key } => {
                let below = self.objects_below(key).await?;
                let size = below.iter().map(|(_, meta)| meta.size).sum();
                let modified = below.iter().map(|(_, meta)| meta.last_modified).max();
                Ok((size, modified))
            }
        }
    }

    async fn transfer(
        &self,
        dir: &ObjectKey,
        names: &[String],
        target: &ObjectKey,
        rename_files: &[String],
        remove_source: bool,
    ) -> Result<TransferReport> {
        if !self.is_root(target) {
            let listing = self.call(self.store.list(target.as_str(), Some('/'))).await?;
            if listing.objects.is_empty() && listing.prefixes.is_empty() {
                return Err(GatewayError::NotFound(self.keys.virtual_path(target)));
            }
        }

        let mut report = TransferReport::default();
        for name in names {
            let item = self.require(dir, name).await?;
            if let Item::Directory { key } = &item
                && target.is_within(key)
            {
                return Err(GatewayError::InvalidArgument(
                    "the destination folder is a subfolder of the source folder".to_string(),
                ));
            }

            let mut dest_name = item.name().to_string();
            if self.resolve(target, &dest_name).await?.is_some() {
                if !rename_files.iter().any(|candidate| *candidate == dest_name) {
                    report.conflicts.push(dest_name);
                    continue;
                }
                dest_name = self.free_name(target, &dest_name, item.is_directory()).await?;
            }
            report
                .files
                .push(self.relocate(&item, target, &dest_name, remove_source).await?);
        }
        Ok(report)
    }

    /// Copies `item` into `target_dir` as `dest_name`, then optionally removes
    /// the source. Deletion only starts after every copy succeeded.
    async fn relocate(
        &self,
        item: &Item,
        target_dir: &ObjectKey,
        dest_name: &str,
        remove_source: bool,
    ) -> Result<FileEntry> {
        let filter_path = self.keys.virtual_path(target_dir);
        match item {
            Item::File { key, meta } => {
                let dst = target_dir.join(dest_name)?;
                self.call(self.store.copy(key.as_str(), dst.as_str())).await?;
                if remove_source {
                    self.remove_sources(vec![key.clone()]).await;
                }
                let meta = ObjectMeta {
                    key: dst.to_string(),
                    last_modified: time::now(),
                    ..meta.clone()
                };
                Ok(FileEntry::file(dest_name, filter_path, &meta))
            }
            Item::Directory { key } => {
                let dst_dir = target_dir.join(&format!("{dest_name}/"))?;
                let below = self.objects_below(key).await?;
                let has_child = has_subdirectory(key, &below);

                let mut pairs = Vec::with_capacity(below.len());
                for (src, _) in &below {
                    let relative = src.relative_to(key).unwrap_or_default();
                    pairs.push((src.clone(), dst_dir.join(relative)?));
                }
                futures::stream::iter(pairs)
                    .map(|(src, dst)| async move {
                        self.call(self.store.copy(src.as_str(), dst.as_str())).await
                    })
                    .buffer_unordered(MAX_CONCURRENT_CALLS)
                    .try_collect::<Vec<()>>()
                    .await?;

                if remove_source {
                    self.remove_sources(below.into_iter().map(|(key, _)| key).collect())
                        .await;
                }
                Ok(FileEntry::directory(dest_name, filter_path, time::now(), has_child))
            }
        }
    }

    async fn remove_sources(&self, keys: Vec<ObjectKey>) {
        let total = keys.len();
        let failed = self.delete_keys(keys).await;
        if failed > 0 {
            warn!(
                failed,
                total, "copied objects kept their source after a failed delete"
            );
        }
    }

    /// Deletes `keys` concurrently and returns how many deletions failed.
    async fn delete_keys(&self, keys: Vec<ObjectKey>) -> usize {
        futures::stream::iter(keys)
            .map(|key| async move {
                let result = self.call(self.store.delete(key.as_str())).await;
                (key, result)
            })
            .buffer_unordered(MAX_CONCURRENT_CALLS)
            .filter_map(|(key, result)| async move {
                result.err().map(|err| {
                    warn!(key = %key, error = %err, "failed to delete object");
                })
            })
            .count()
            .await
    }

    /// First `stem(n).ext` (or `name(n)` for directories) not yet taken in `dir`.
    async fn free_name(&self, dir: &ObjectKey, name: &str, is_directory: bool) -> Result<String> {
        let (stem, extension) = if is_directory {
            (name.to_string(), String::new())
        } else {
            let extension = extension_of(name);
            (name[..name.len() - extension.len()].to_string(), extension)
        };
        for attempt in 1..=MAX_RENAME_ATTEMPTS {
            let candidate = format!("{stem}({attempt}){extension}");
            if self.resolve(dir, &candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(GatewayError::AlreadyExists(name.to_string()))
    }
}

fn marker_time(listing: &Listing, dir: &ObjectKey) -> DateTime<Utc> {
    listing
        .objects
        .iter()
        .find(|meta| meta.key == dir.as_str())
        .map(|meta| meta.last_modified)
        .unwrap_or_else(time::now)
}

fn has_subdirectory(dir: &ObjectKey, below: &[(ObjectKey, ObjectMeta)]) -> bool {
    below.iter().any(|(key, _)| {
        key.relative_to(dir)
            .is_some_and(|relative| relative.contains('/'))
    })
}

/// Directories first, then by case-insensitive name.
fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        a.is_file
            .cmp(&b.is_file)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::memory::{MemoryObjectStore, Operation};

    struct Fixture {
        memory: Arc<MemoryObjectStore>,
        docs: DocumentStore,
    }

    impl Fixture {
        fn new() -> Self {
            let memory = Arc::new(MemoryObjectStore::new());
            let docs = DocumentStore::new(memory.clone(), KeyMapper::default(), DEFAULT_DEADLINE);
            Self { memory, docs }
        }

        async fn put(&self, key: &str, data: &'static [u8]) {
            let body = futures::stream::iter(vec![Ok(Bytes::from_static(data))]).boxed();
            self.memory.put(key, body, None).await.unwrap();
        }

        fn dir(&self, path: &str) -> ObjectKey {
            self.docs.keys().directory(path).unwrap()
        }

        fn names(listing: &DirectoryListing) -> Vec<&str> {
            listing.files.iter().map(|entry| entry.name.as_str()).collect()
        }
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test]
    async fn list_separates_directories_and_files() {
        let fx = Fixture::new();
        fx.put("Files/b.pdf", b"b").await;
        fx.put("Files/A.pdf", b"a").await;
        fx.put("Files/Reports/", b"").await;
        fx.put("Files/Reports/2024/q1.pdf", b"q1").await;
        fx.put("Files/.hidden", b"h").await;

        let listing = fx.docs.list(&fx.dir("/"), false).await.unwrap();
        assert_eq!(listing.cwd.name, "Files");
        assert!(listing.cwd.has_child);
        assert_eq!(Fixture::names(&listing), vec!["Reports", "A.pdf", "b.pdf"]);
        assert!(listing.files[0].has_child);
        assert_eq!(listing.files[1].filter_path, "/");
        assert_eq!(listing.files[1].file_type, ".pdf");

        let with_hidden = fx.docs.list(&fx.dir("/"), true).await.unwrap();
        assert!(Fixture::names(&with_hidden).contains(&".hidden"));
    }

    #[tokio::test]
    async fn listing_a_missing_directory_is_not_found() {
        let fx = Fixture::new();
        let err = fx.docs.list(&fx.dir("/missing/"), false).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_rejects_existing_names() {
        let fx = Fixture::new();
        let root = fx.dir("/");
        let entry = fx.docs.create_directory(&root, "Invoices").await.unwrap();
        assert!(!entry.is_file);
        assert!(fx.memory.keys().contains(&"Files/Invoices/".to_string()));

        let err = fx.docs.create_directory(&root, "Invoices").await.unwrap_err();
        assert!(matches!(err, GatewayError::AlreadyExists(name) if name == "Invoices"));
    }

    #[tokio::test]
    async fn delete_removes_whole_directories() {
        let fx = Fixture::new();
        fx.put("Files/Old/", b"").await;
        fx.put("Files/Old/a.pdf", b"a").await;
        fx.put("Files/Old/deep/b.pdf", b"b").await;
        fx.put("Files/keep.pdf", b"k").await;

        let deleted = fx.docs.delete(&fx.dir("/"), &names(&["Old"])).await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].has_child);
        assert_eq!(fx.memory.keys(), vec!["Files/keep.pdf".to_string()]);
    }

    #[tokio::test]
    async fn failed_deletes_are_aggregated() {
        let fx = Fixture::new();
        fx.put("Files/a.pdf", b"a").await;
        fx.put("Files/b.pdf", b"b").await;
        fx.memory.fail(Operation::Delete);

        let err = fx
            .docs
            .delete(&fx.dir("/"), &names(&["a.pdf", "b.pdf"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Backend(BackendError::PartialDelete { failed: 2, total: 2 })
        ));
    }

    #[tokio::test]
    async fn move_keeps_the_source_when_delete_fails() {
        let fx = Fixture::new();
        fx.put("Files/a.pdf", b"a").await;
        fx.put("Files/Archive/", b"").await;
        fx.memory.fail(Operation::Delete);

        let report = fx
            .docs
            .move_items(&fx.dir("/"), &names(&["a.pdf"]), &fx.dir("/Archive/"), &[])
            .await
            .unwrap();
        assert_eq!(report.files.len(), 1);
        let keys = fx.memory.keys();
        assert!(keys.contains(&"Files/a.pdf".to_string()));
        assert!(keys.contains(&"Files/Archive/a.pdf".to_string()));
    }

    #[tokio::test]
    async fn copy_reports_conflicts_and_renames_on_request() {
        let fx = Fixture::new();
        fx.put("Files/a.pdf", b"new").await;
        fx.put("Files/b.pdf", b"b").await;
        fx.put("Files/Archive/a.pdf", b"old").await;
        fx.put("Files/Archive/b.pdf", b"old").await;

        let report = fx
            .docs
            .copy(&fx.dir("/"), &names(&["a.pdf", "b.pdf"]), &fx.dir("/Archive/"), &names(&["b.pdf"]))
            .await
            .unwrap();
        assert_eq!(report.conflicts, vec!["a.pdf".to_string()]);
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].name, "b(1).pdf");
        assert!(fx.memory.keys().contains(&"Files/Archive/b(1).pdf".to_string()));
    }

    #[tokio::test]
    async fn directories_cannot_be_copied_into_themselves() {
        let fx = Fixture::new();
        fx.put("Files/a/", b"").await;
        fx.put("Files/a/b/", b"").await;

        let err = fx
            .docs
            .copy(&fx.dir("/"), &names(&["a"]), &fx.dir("/a/b/"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn rename_moves_every_object_of_a_directory() {
        let fx = Fixture::new();
        fx.put("Files/Drafts/", b"").await;
        fx.put("Files/Drafts/x.pdf", b"x").await;

        let entry = fx.docs.rename(&fx.dir("/"), "Drafts", "Final").await.unwrap();
        assert_eq!(entry.name, "Final");
        assert_eq!(
            fx.memory.keys(),
            vec!["Files/Final/".to_string(), "Files/Final/x.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn search_walks_nested_directories() {
        let fx = Fixture::new();
        fx.put("Files/report.pdf", b"r").await;
        fx.put("Files/Reports/2024/q1-report.pdf", b"q").await;
        fx.put("Files/Reports/2024/notes.txt", b"n").await;

        let found = fx
            .docs
            .search(&fx.dir("/"), "*report*", false, false)
            .await
            .unwrap();
        assert_eq!(
            Fixture::names(&found),
            vec!["Reports", "q1-report.pdf", "report.pdf"]
        );
        let nested = found
            .files
            .iter()
            .find(|entry| entry.name == "q1-report.pdf")
            .unwrap();
        assert_eq!(nested.filter_path, "/Reports/2024/");
        assert!(found.files[0].has_child);
    }

    #[tokio::test]
    async fn search_skips_contents_of_hidden_folders() {
        let fx = Fixture::new();
        fx.put("Files/.private/report.pdf", b"p").await;
        fx.put("Files/Reports/report.pdf", b"r").await;

        let visible = fx.docs.search(&fx.dir("/"), "report", false, false).await.unwrap();
        assert_eq!(Fixture::names(&visible), vec!["Reports", "report.pdf"]);
        assert_eq!(visible.files[1].filter_path, "/Reports/");

        let all = fx.docs.search(&fx.dir("/"), "report", false, true).await.unwrap();
        assert_eq!(all.files.iter().filter(|entry| entry.is_file).count(), 2);
    }

    #[tokio::test]
    async fn details_without_names_describe_the_folder() {
        let fx = Fixture::new();
        fx.put("Files/Reports/", b"").await;
        fx.put("Files/Reports/q1.pdf", b"1234").await;
        fx.put("Files/Reports/2024/q2.pdf", b"56").await;

        let folder = fx.docs.details(&fx.dir("/Reports/"), &[]).await.unwrap();
        assert_eq!(folder.name, "Reports");
        assert_eq!(folder.location, "/Reports/");
        assert_eq!(folder.size, 6);
        assert!(!folder.is_file);
        assert!(!folder.multiple_files);

        let root = fx.docs.details(&fx.dir("/"), &[]).await.unwrap();
        assert_eq!(root.name, "Files");
        assert_eq!(root.location, "/");

        let err = fx.docs.details(&fx.dir("/missing/"), &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn details_aggregate_multiple_items() {
        let fx = Fixture::new();
        fx.put("Files/a.pdf", b"12345").await;
        fx.put("Files/Dir/b.pdf", b"123").await;

        let single = fx.docs.details(&fx.dir("/"), &names(&["a.pdf"])).await.unwrap();
        assert_eq!(single.size, 5);
        assert!(single.is_file);
        assert_eq!(single.location, "/a.pdf");

        let many = fx
            .docs
            .details(&fx.dir("/"), &names(&["a.pdf", "Dir"]))
            .await
            .unwrap();
        assert_eq!(many.size, 8);
        assert!(many.multiple_files);
        assert_eq!(many.name, "a.pdf, Dir");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backends_time_out() {
        let memory = Arc::new(MemoryObjectStore::new());
        memory.delay(Duration::from_secs(60));
        let docs = DocumentStore::new(memory, KeyMapper::default(), Duration::from_secs(1));

        let err = docs.ping().await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout(_)));
    }
}
