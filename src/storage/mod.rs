//! Subscription storage.
//!
//! The feed core never touches storage directly; it receives a
//! [`Subscription`] and hands back values for a [`Repository`] to persist.
//! Two implementations are provided: [`MemoryRepository`] for tests and
//! embedding, and [`JsonRepository`] for the on-disk layout used by the CLI.

mod json;
mod memory;
mod types;

use async_trait::async_trait;

pub use json::JsonRepository;
pub use memory::MemoryRepository;
pub use types::{LastFetch, StorageError, Subscription};

/// Persistence for subscriptions and the feed content stored for each.
///
/// Content is addressed by [`Subscription::read_from`].
#[async_trait]
pub trait Repository: Send + Sync {
    /// All subscriptions in insertion order.
    async fn list(&self) -> Result<Vec<Subscription>, StorageError>;

    async fn get(&self, id: &str) -> Result<Option<Subscription>, StorageError> {
        Ok(self.list().await?.into_iter().find(|sub| sub.id == id))
    }

    /// Inserts `subscription`, or replaces the stored one with the same id.
    async fn put(&self, subscription: Subscription) -> Result<(), StorageError>;

    /// Removes and returns the subscription with `id`.
    ///
    /// Fails with [`StorageError::NotFound`] for unknown ids. Stored content
    /// is left alone; see [`Repository::remove_content`].
    async fn remove(&self, id: &str) -> Result<Subscription, StorageError>;

    async fn read_content(&self, subscription: &Subscription) -> Result<String, StorageError>;

    async fn write_content(&self, subscription: &Subscription, xml: &str) -> Result<(), StorageError>;

    /// Deletes stored content. Missing content is not an error.
    async fn remove_content(&self, subscription: &Subscription) -> Result<(), StorageError>;
}
