//! Delivery request lifecycle, item management and access control.
//!
//! [`Swopp`] is the single entry point the HTTP layer talks to. Every
//! mutating operation goes through the access guard, consults the transition
//! table in `swopp_types::lifecycle`, and commits inside one database
//! transaction that re-reads the request row before writing.

pub mod error;
pub mod guard;
pub mod items;
pub mod requests;
pub mod rows;
pub mod storage;
pub mod users;

use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use swopp_db::Database;

pub use error::{Result, SwoppError};
pub use guard::Actor;
pub use storage::{ImageStore, ImageUpload};

/// 5 MB upload limit for images
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Operator-tunable rules.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Whether a sender may still delete a request after a driver accepted it.
    pub accepted_withdrawal: bool,
    pub max_image_bytes: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            accepted_withdrawal: false,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Image keys a delete could not remove from storage. The database side of
/// the delete committed; these files are orphaned and were logged.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Cleanup {
    pub orphaned: Vec<String>,
}

impl Cleanup {
    async fn remove(store: &dyn ImageStore, keys: impl IntoIterator<Item = String>) -> Self {
        let mut orphaned = Vec::new();
        for key in keys {
            if !storage::delete_best_effort(store, &key).await {
                orphaned.push(key);
            }
        }
        Self { orphaned }
    }
}

#[derive(Clone)]
pub struct Swopp {
    db: Arc<Database>,
    images: Arc<dyn ImageStore>,
    policy: Policy,
}

impl Swopp {
    pub fn new(db: Arc<Database>, images: Arc<dyn ImageStore>, policy: Policy) -> Self {
        Self { db, images, policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn images(&self) -> &dyn ImageStore {
        self.images.as_ref()
    }

    /// Run blocking database work off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                SwoppError::Storage(anyhow!("blocking task failed: {}", e))
            })?
    }

    /// Store a validated upload under a fresh key and return the key.
    async fn store_image(&self, upload: &ImageUpload) -> Result<String> {
        let kind = upload.validate(self.policy.max_image_bytes)?;
        let key = storage::new_image_key(kind);
        self.images.put(&key, &upload.bytes).await.map_err(|e| {
            error!("Failed to store image {}: {}", key, e);
            SwoppError::Storage(e)
        })?;
        Ok(key)
    }

    /// Undo `store_image` after the database write that would have referenced
    /// the key failed.
    async fn discard_image(&self, key: Option<&str>) {
        if let Some(key) = key {
            storage::delete_best_effort(self.images.as_ref(), key).await;
        }
    }
}
