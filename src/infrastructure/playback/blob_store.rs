//! In-memory object URL registry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::playback::AudioPayload;

const URL_PREFIX: &str = "blob:chat-voice/";

/// Maps `blob:` URLs to the payloads they stand for
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    entries: Arc<Mutex<HashMap<String, AudioPayload>>>,
    next_id: Arc<AtomicU64>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, AudioPayload>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `payload` under a fresh URL
    pub fn create(&self, payload: &AudioPayload) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let url = format!("{}{}", URL_PREFIX, id);
        self.entries().insert(url.clone(), payload.clone());
        url
    }

    pub fn get(&self, url: &str) -> Option<AudioPayload> {
        self.entries().get(url).cloned()
    }

    /// Forget `url`. Unknown URLs are ignored.
    pub fn revoke(&self, url: &str) -> bool {
        self.entries().remove(url).is_some()
    }

    /// Number of URLs not yet revoked
    pub fn live_count(&self) -> usize {
        self.entries().len()
    }
}
