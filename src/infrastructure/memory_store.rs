//! In-process key-value store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::ports::KeyValueStore;
use crate::Result;

#[derive(Debug, Default)]
pub struct MemoryStore { entries: RwLock<HashMap<String, String>> }

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
    pub async fn len(&self) -> usize { self.entries.read().await.len() }
    pub async fn is_empty(&self) -> bool { self.entries.read().await.is_empty() }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> { Ok(self.entries.read().await.get(key).cloned()) }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
