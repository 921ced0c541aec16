use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Repository, StorageError, Subscription};

/// Repository kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    subscriptions: RwLock<Vec<Subscription>>,
    contents: RwLock<HashMap<String, String>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list(&self) -> Result<Vec<Subscription>, StorageError> {
        Ok(self.subscriptions.read().await.clone())
    }

    async fn put(&self, subscription: Subscription) -> Result<(), StorageError> {
        let mut subscriptions = self.subscriptions.write().await;
        match subscriptions.iter_mut().find(|sub| sub.id == subscription.id) {
            Some(existing) => *existing = subscription,
            None => subscriptions.push(subscription),
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<Subscription, StorageError> {
        let mut subscriptions = self.subscriptions.write().await;
        let index = subscriptions
            .iter()
            .position(|sub| sub.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_owned()))?;
        Ok(subscriptions.remove(index))
    }

    async fn read_content(&self, subscription: &Subscription) -> Result<String, StorageError> {
        self.contents
            .read()
            .await
            .get(&subscription.read_from)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(subscription.read_from.clone()))
    }

    async fn write_content(&self, subscription: &Subscription, xml: &str) -> Result<(), StorageError> {
        self.contents
            .write()
            .await
            .insert(subscription.read_from.clone(), xml.to_owned());
        Ok(())
    }

    async fn remove_content(&self, subscription: &Subscription) -> Result<(), StorageError> {
        self.contents.write().await.remove(&subscription.read_from);
        Ok(())
    }
}
