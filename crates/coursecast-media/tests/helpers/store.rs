#![allow(dead_code)]
//! In-memory object store with call counters for upload-path assertions.

use async_trait::async_trait;
use bytes::Bytes;
use coursecast_storage::{
    ByteStream, CompletedObject, ObjectStore, PartEtag, StorageBackend, StorageError,
    StorageResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct CallCounters {
    pub begin_multipart: AtomicUsize,
    pub upload_part: AtomicUsize,
    pub complete_multipart: AtomicUsize,
    pub abort_multipart: AtomicUsize,
    pub put_object: AtomicUsize,
}

impl CallCounters {
    pub fn begins(&self) -> usize {
        self.begin_multipart.load(Ordering::SeqCst)
    }
    pub fn parts(&self) -> usize {
        self.upload_part.load(Ordering::SeqCst)
    }
    pub fn completes(&self) -> usize {
        self.complete_multipart.load(Ordering::SeqCst)
    }
    pub fn aborts(&self) -> usize {
        self.abort_multipart.load(Ordering::SeqCst)
    }
    pub fn puts(&self) -> usize {
        self.put_object.load(Ordering::SeqCst)
    }
}

struct MultipartSession {
    key: String,
    parts: HashMap<i32, Bytes>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, Bytes>,
    sessions: HashMap<String, MultipartSession>,
    next_upload_id: usize,
}

/// In-memory ObjectStore. Counts every call and supports injecting a part
/// upload failure at a given part number.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Mutex<Inner>>,
    pub calls: Arc<CallCounters>,
    fail_part_number: Option<i32>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `upload_part` call with this part number fails.
    pub fn failing_at_part(part_number: i32) -> Self {
        Self {
            fail_part_number: Some(part_number),
            ..Self::default()
        }
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.inner.lock().unwrap().objects.get(key).cloned()
    }

    pub fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().unwrap().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn seed(&self, key: &str, data: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), Bytes::copy_from_slice(data));
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn begin_multipart(&self, key: &str, _content_type: &str) -> StorageResult<String> {
        self.calls.begin_multipart.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        inner.next_upload_id += 1;
        let upload_id = format!("upload-{}", inner.next_upload_id);
        inner.sessions.insert(
            upload_id.clone(),
            MultipartSession {
                key: key.to_string(),
                parts: HashMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> StorageResult<PartEtag> {
        self.calls.upload_part.fetch_add(1, Ordering::SeqCst);

        if self.fail_part_number == Some(part_number) {
            return Err(StorageError::UploadFailed(format!(
                "injected failure at part {}",
                part_number
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::UploadFailed(format!("unknown upload: {}", upload_id)))?;
        session.parts.insert(part_number, data);

        Ok(PartEtag {
            part_number,
            etag: format!("etag-{}", part_number),
        })
    }

    async fn complete_multipart(
        &self,
        _key: &str,
        upload_id: &str,
        mut parts: Vec<PartEtag>,
    ) -> StorageResult<CompletedObject> {
        self.calls.complete_multipart.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .remove(upload_id)
            .ok_or_else(|| StorageError::UploadFailed(format!("unknown upload: {}", upload_id)))?;

        parts.sort_by_key(|p| p.part_number);
        let mut assembled = Vec::new();
        for part in &parts {
            let data = session.parts.get(&part.part_number).ok_or_else(|| {
                StorageError::UploadFailed(format!("missing part {}", part.part_number))
            })?;
            assembled.extend_from_slice(data);
        }

        let key = session.key;
        let location = format!("mem://{}", key);
        inner.objects.insert(key, Bytes::from(assembled));

        Ok(CompletedObject {
            location,
            etag: Some(format!("etag-{}-parts", parts.len())),
        })
    }

    async fn abort_multipart(&self, _key: &str, upload_id: &str) -> StorageResult<()> {
        self.calls.abort_multipart.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().unwrap().sessions.remove(upload_id);
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.calls.put_object.fetch_add(1, Ordering::SeqCst);
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), data);
        Ok(format!("mem://{}", key))
    }

    async fn get_object_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let data = self
            .inner
            .lock()
            .unwrap()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(Box::pin(futures::stream::iter(vec![Ok(data)])))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.lock().unwrap().objects.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.inner.lock().unwrap().objects.contains_key(key))
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(key)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn public_url(&self, key: &str) -> String {
        format!("mem://{}", key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
