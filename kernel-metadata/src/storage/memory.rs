use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use eyre::Result;
use tokio::sync::Mutex;

use super::CacheStorage;

#[derive(Clone, Default)]
pub struct MemoryStorage {
    pub db: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub should_fail: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    pub async fn len(&self) -> usize {
        self.db.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CacheStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(eyre::eyre!("MemoryStorage simulated failure"));
        }

        Ok(self.db.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(eyre::eyre!("MemoryStorage simulated failure"));
        }

        self.db.lock().await.insert(key.to_owned(), data);
        Ok(())
    }
}
