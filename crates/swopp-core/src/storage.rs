use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SwoppError;

/// Blob storage for item and profile images, addressed by key.
///
/// Keys are generated by [`new_image_key`] and always pass
/// [`ImageKind::from_key`]; stores may rely on that for path safety.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `bytes` under `key`. Must be durable when this returns `Ok`.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `key`. A missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Parse a stored key of the form `<uuid>.<ext>`.
    pub fn from_key(key: &str) -> Option<Self> {
        let (stem, ext) = key.rsplit_once('.')?;
        stem.parse::<Uuid>().ok()?;
        match ext {
            "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    /// Whether `bytes` start with this format's signature.
    pub fn matches(self, bytes: &[u8]) -> bool {
        match self {
            Self::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            Self::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        }
    }
}

/// An uploaded image as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Check the declared type against the allow-list and the actual bytes.
    pub fn validate(&self, max_bytes: usize) -> Result<ImageKind, SwoppError> {
        if self.bytes.is_empty() {
            return Err(SwoppError::validation("image is empty"));
        }
        if self.bytes.len() > max_bytes {
            return Err(SwoppError::Validation(format!(
                "image exceeds {} bytes",
                max_bytes
            )));
        }
        let kind = ImageKind::from_content_type(&self.content_type).ok_or_else(|| {
            SwoppError::Validation(format!(
                "unsupported image type '{}', expected JPEG, PNG or GIF",
                self.content_type
            ))
        })?;
        if !kind.matches(&self.bytes) {
            return Err(SwoppError::validation(
                "image content does not match its declared type",
            ));
        }
        Ok(kind)
    }
}

pub fn new_image_key(kind: ImageKind) -> String {
    format!("{}.{}", Uuid::new_v4(), kind.extension())
}

/// Delete `key`, logging instead of failing. Returns false if the file could
/// not be removed and is now orphaned.
pub async fn delete_best_effort(store: &dyn ImageStore, key: &str) -> bool {
    match store.delete(key).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to delete image {}: {}", key, e);
            false
        }
    }
}

// -- Disk --

/// Stores each image as a flat file at `{dir}/{key}`.
pub struct DiskImageStore {
    dir: PathBuf,
}

impl DiskImageStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn file_path(&self, key: &str) -> Result<PathBuf> {
        if ImageKind::from_key(key).is_none() {
            bail!("Invalid image key '{}'", key);
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.file_path(key)?;
        let partial = path.with_extension("part");

        // Write aside and rename so readers never see a half-written image
        let mut file = fs::File::create(&partial).await?;
        let written = async {
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            fs::remove_file(&partial).await.ok();
            return Err(e.into());
        }
        drop(file);
        fs::rename(&partial, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.file_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.file_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted image {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Image {} already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// -- Memory --

/// In-process store used by tests. Writes and deletes can be made to fail.
#[derive(Default)]
pub struct MemoryImageStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<_> = blobs.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.contains_key(key)
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(anyhow!("put rejected"));
        }
        let mut blobs = self.blobs.lock().map_err(|e| anyhow!("Store lock poisoned: {}", e))?;
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().map_err(|e| anyhow!("Store lock poisoned: {}", e))?;
        Ok(blobs.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(anyhow!("delete rejected"));
        }
        let mut blobs = self.blobs.lock().map_err(|e| anyhow!("Store lock poisoned: {}", e))?;
        blobs.remove(key);
        Ok(())
    }
}
