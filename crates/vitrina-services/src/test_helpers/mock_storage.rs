//! Mock object storage for tests
//!
//! Objects are metadata only; nothing stores bytes.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vitrina_storage::{ObjectMetadata, ObjectStorage, StorageError, StorageResult};

#[derive(Clone, Default)]
pub struct MockObjectStorage {
    objects: Arc<Mutex<HashMap<String, ObjectMetadata>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    head_calls: Arc<AtomicUsize>,
    head_delay: Arc<Mutex<Option<Duration>>>,
    presign_delay: Arc<Mutex<Option<Duration>>>,
    fail_head: Arc<AtomicBool>,
    fail_delete: Arc<AtomicBool>,
    fail_presign: Arc<AtomicBool>,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a client PUT that landed `size` bytes with `etag`.
    pub fn put_object(&self, key: &str, size: u64, etag: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            ObjectMetadata {
                size,
                e_tag: Some(format!("\"{}\"", etag)),
                last_modified: Utc::now(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    /// Make every HEAD sleep for `delay` before answering.
    pub fn set_head_delay(&self, delay: Option<Duration>) {
        *self.head_delay.lock().unwrap() = delay;
    }

    /// Make every presign sleep for `delay` before answering.
    pub fn set_presign_delay(&self, delay: Option<Duration>) {
        *self.presign_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_head(&self, fail: bool) {
        self.fail_head.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_presign(&self, fail: bool) {
        self.fail_presign.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let delay = *self.presign_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_presign.load(Ordering::SeqCst) {
            return Err(StorageError::PresignFailed("mock presign failure".to_string()));
        }
        Ok(format!(
            "https://mock-storage.local/{}?X-Amz-Expires={}",
            storage_key,
            expires_in.as_secs()
        ))
    }

    async fn head(&self, storage_key: &str) -> StorageResult<Option<ObjectMetadata>> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        // Let concurrent confirmations interleave between read and write
        tokio::task::yield_now().await;

        let delay = *self.head_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_head.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("connection reset".to_string()));
        }
        Ok(self.objects.lock().unwrap().get(storage_key).cloned())
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed("mock delete failure".to_string()));
        }
        self.objects.lock().unwrap().remove(storage_key);
        self.deleted.lock().unwrap().push(storage_key.to_string());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
