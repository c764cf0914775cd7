//! Blob storage for record payloads and verification evidence.
//!
//! Payloads are content-addressed: the locator is `blake3:<hex digest>`,
//! so storing the same bytes twice yields the same locator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use medvault_core::BlobLocator;

use crate::error::{Result, StoreError};

const LOCATOR_PREFIX: &str = "blake3:";

/// Opaque payload storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a payload and return its locator.
    ///
    /// `name` is the client-supplied file name, used for logging only.
    async fn put(&self, name: &str, bytes: Bytes) -> Result<BlobLocator>;

    /// Fetch a payload by locator.
    ///
    /// Returns `BlobNotFound` if nothing is stored under the locator.
    async fn get(&self, locator: &BlobLocator) -> Result<Bytes>;
}

/// Compute the content locator for a payload.
pub fn locator_for(bytes: &[u8]) -> BlobLocator {
    BlobLocator::new(format!("{LOCATOR_PREFIX}{}", blake3::hash(bytes).to_hex()))
}

// Extract and validate the digest part of a locator.
fn digest_of(locator: &BlobLocator) -> Result<&str> {
    let digest = locator
        .as_str()
        .strip_prefix(LOCATOR_PREFIX)
        .ok_or_else(|| StoreError::InvalidData(format!("unsupported locator: {locator}")))?;

    if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(StoreError::InvalidData(format!("malformed locator: {locator}")));
    }
    Ok(digest)
}

/// In-memory blob store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct payloads held.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, name: &str, bytes: Bytes) -> Result<BlobLocator> {
        let locator = locator_for(&bytes);
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.insert(locator.as_str().to_string(), bytes);
        debug!(%locator, name, "stored blob");
        Ok(locator)
    }

    async fn get(&self, locator: &BlobLocator) -> Result<Bytes> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        blobs
            .get(locator.as_str())
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(locator.to_string()))
    }
}

/// Blob store backed by a directory, one file per digest.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a blob directory, creating it if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, name: &str, bytes: Bytes) -> Result<BlobLocator> {
        let locator = locator_for(&bytes);
        let path = self.root.join(digest_of(&locator)?);
        let size = bytes.len();

        tokio::task::spawn_blocking(move || std::fs::write(path, &bytes))
            .await
            .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))??;

        debug!(%locator, name, size, "wrote blob");
        Ok(locator)
    }

    async fn get(&self, locator: &BlobLocator) -> Result<Bytes> {
        let path = self.root.join(digest_of(locator)?);
        let missing = locator.to_string();

        let read = tokio::task::spawn_blocking(move || std::fs::read(path))
            .await
            .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?;

        match read {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::BlobNotFound(missing))
            }
            Err(e) => Err(e.into()),
        }
    }
}
