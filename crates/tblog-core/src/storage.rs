//! Storage backend abstraction for object storage (S3, GCS, memory).
//!
//! This module defines the store contract the consolidation pipeline relies on:
//! - Listing by prefix, either recursively or one level deep with `/` as delimiter
//! - Whole-object reads that report a missing object as `Error::NotFound`
//! - Whole-object writes (full replace, no partial update)
//! - Batch deletes
//!
//! ## Ordering
//!
//! Listings are returned in lexicographic key order. Fragment keys embed an
//! ISO-8601 basic timestamp, so lexicographic order is chronological order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};

use crate::error::{Error, Result};

/// The only delimiter supported by delimited listings.
pub const DELIMITER: char = '/';

/// Result of a delimited listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResult {
    /// Immediate child prefixes, each ending in `/`.
    pub common_prefixes: Vec<String>,
}

/// Storage backend trait for object storage.
///
/// All storage backends (S3, GCS, memory) implement this trait.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes an entire object, replacing any existing content.
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Deletes a batch of objects in a single request.
    ///
    /// Missing objects are not an error. A failure for any key fails the batch.
    async fn delete_many(&self, paths: &[String]) -> Result<()>;

    /// Lists every object key under `prefix`, recursively, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Lists one level under `prefix` using `/` as the delimiter.
    ///
    /// `prefix` should end with `/`. Objects directly under `prefix` are not
    /// reported; child prefixes come back lexicographically ordered.
    async fn list_with_delimiter(&self, prefix: &str) -> Result<ListResult>;
}

/// In-memory storage backend.
///
/// Thread-safe via `RwLock`; keys are kept in a `BTreeMap` so listings come back
/// sorted the way cloud object stores return them.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the content type recorded for an object, if present.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the lock is poisoned.
    pub fn content_type(&self, path: &str) -> Result<Option<String>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects.get(path).map(|o| o.content_type.clone()))
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

/// Collects the child prefixes one level under `prefix`.
///
/// Shared by every in-process backend so they agree on delimiter semantics.
#[must_use]
pub fn delimited_view<'a>(keys: impl IntoIterator<Item = &'a str>, prefix: &str) -> ListResult {
    let common_prefixes: BTreeSet<String> = keys
        .into_iter()
        .filter_map(|key| key.strip_prefix(prefix))
        .filter_map(|rest| rest.find(DELIMITER).map(|idx| format!("{prefix}{}", &rest[..=idx])))
        .collect();

    ListResult {
        common_prefixes: common_prefixes.into_iter().collect(),
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        if path.is_empty() {
            return Err(Error::InvalidInput("object key cannot be empty".into()));
        }

        self.objects.write().map_err(|_| poisoned())?.insert(
            path.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_many(&self, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn list_with_delimiter(&self, prefix: &str) -> Result<ListResult> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(delimited_view(objects.keys().map(String::as_str), prefix))
    }
}

/// Cloud object storage backend built on the `object_store` crate.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    /// Wraps an existing `object_store` implementation.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Creates a backend from a bucket reference.
    ///
    /// Accepts `s3://bucket`, `gs://bucket`, or a bare bucket name (treated as S3).
    /// Credentials and region are read from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket name is empty or the client cannot be built.
    pub fn from_bucket(bucket: &str) -> Result<Self> {
        let bucket = bucket.trim();
        if let Some(name) = bucket.strip_prefix("gs://") {
            return Self::gcs(name.trim_end_matches('/'));
        }
        let name = bucket.strip_prefix("s3://").unwrap_or(bucket);
        Self::s3(name.trim_end_matches('/'))
    }

    /// Creates an S3 backend for the named bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket name is empty or the client cannot be built.
    pub fn s3(bucket: &str) -> Result<Self> {
        if bucket.is_empty() {
            return Err(Error::InvalidInput("bucket name cannot be empty".into()));
        }
        let store = object_store::aws::AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Creates a GCS backend for the named bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket name is empty or the client cannot be built.
    pub fn gcs(bucket: &str) -> Result<Self> {
        if bucket.is_empty() {
            return Err(Error::InvalidInput("bucket name cannot be empty".into()));
        }
        let store = object_store::gcp::GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        Ok(Self::new(Arc::new(store)))
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let result = self.store.get(&Path::from(path)).await?;
        Ok(result.bytes().await?)
    }

    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..PutOptions::default()
        };
        self.store
            .put_opts(&Path::from(path), PutPayload::from(data), opts)
            .await?;
        Ok(())
    }

    async fn delete_many(&self, paths: &[String]) -> Result<()> {
        let locations = futures::stream::iter(
            paths
                .iter()
                .map(|p| Ok::<_, object_store::Error>(Path::from(p.as_str())))
                .collect::<Vec<_>>(),
        )
        .boxed();

        // Each key resolves on its own; an absent key must not end the stream
        // before the keys after it are attempted.
        self.store
            .delete_stream(locations)
            .filter(|result| {
                futures::future::ready(!matches!(
                    result,
                    Err(object_store::Error::NotFound { .. })
                ))
            })
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix_path = Path::from(prefix);
        let mut keys: Vec<String> = self
            .store
            .list(Some(&prefix_path))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;
        keys.sort();
        Ok(keys)
    }

    async fn list_with_delimiter(&self, prefix: &str) -> Result<ListResult> {
        let prefix_path = Path::from(prefix);
        let listing = self.store.list_with_delimiter(Some(&prefix_path)).await?;

        let mut common_prefixes: Vec<String> = listing
            .common_prefixes
            .iter()
            .map(|p| format!("{p}{DELIMITER}"))
            .collect();
        common_prefixes.sort();

        Ok(ListResult { common_prefixes })
    }
}
