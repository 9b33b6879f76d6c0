use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use homestash_core::domain::item::{Item, ItemId, NewItem, OwnerId};
use homestash_core::domain::map::FloorMap;

pub mod item;
pub mod map;
pub mod memory;

pub use item::SqlItemRepository;
pub use map::SqlMapRepository;
pub use memory::{InMemoryItemRepository, InMemoryMapRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable store of captured items, partitioned per owner. Inserts stamp
/// `created_at` = `last_used` = now; nothing in the catalog ever refreshes
/// `last_used` afterwards.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn save(&self, item: NewItem) -> Result<ItemId, RepositoryError>;

    /// All items for the owner in store order (insertion order for SQLite
    /// autoincrement ids).
    async fn list_for_owner(&self, owner_id: &OwnerId) -> Result<Vec<Item>, RepositoryError>;

    /// Items whose `last_used` is strictly before `cutoff`.
    async fn find_stale(
        &self,
        owner_id: &OwnerId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Item>, RepositoryError>;
}

/// One floor plan per owner, insert-or-replace.
#[async_trait]
pub trait MapRepository: Send + Sync {
    async fn upsert(&self, map: FloorMap) -> Result<(), RepositoryError>;
    async fn find_by_owner(&self, owner_id: &OwnerId) -> Result<Option<FloorMap>, RepositoryError>;
}
