use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use homestash_core::domain::item::{Item, ItemId, NewItem, OwnerId};
use homestash_core::domain::map::FloorMap;

use super::{ItemRepository, MapRepository, RepositoryError};

/// Engine tests run against these instead of a SQLite pool.
#[derive(Default)]
pub struct InMemoryItemRepository {
    next_id: AtomicI64,
    items: RwLock<Vec<Item>>,
}

impl InMemoryItemRepository {
    /// Backdate an item so retention tests can age rows without sleeping.
    pub async fn set_last_used(&self, id: ItemId, last_used: DateTime<Utc>) {
        let mut items = self.items.write().await;
        if let Some(item) = items.iter_mut().find(|item| item.id == id) {
            item.last_used = last_used;
        }
    }
}

#[async_trait::async_trait]
impl ItemRepository for InMemoryItemRepository {
    async fn save(&self, item: NewItem) -> Result<ItemId, RepositoryError> {
        let id = ItemId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let now = Utc::now();
        let name = item.display_name().to_owned();

        let mut items = self.items.write().await;
        items.push(Item {
            id,
            owner_id: item.owner_id,
            name,
            description: item.description,
            photo_ref: item.photo_ref,
            tags: item.tags,
            location: item.location,
            created_at: now,
            last_used: now,
        });

        Ok(id)
    }

    async fn list_for_owner(&self, owner_id: &OwnerId) -> Result<Vec<Item>, RepositoryError> {
        let items = self.items.read().await;
        Ok(items.iter().filter(|item| &item.owner_id == owner_id).cloned().collect())
    }

    async fn find_stale(
        &self,
        owner_id: &OwnerId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Item>, RepositoryError> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .filter(|item| &item.owner_id == owner_id && item.last_used < cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryMapRepository {
    maps: RwLock<HashMap<String, FloorMap>>,
}

#[async_trait::async_trait]
impl MapRepository for InMemoryMapRepository {
    async fn upsert(&self, map: FloorMap) -> Result<(), RepositoryError> {
        let mut maps = self.maps.write().await;
        maps.insert(map.owner_id.0.clone(), map);
        Ok(())
    }

    async fn find_by_owner(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Option<FloorMap>, RepositoryError> {
        let maps = self.maps.read().await;
        Ok(maps.get(&owner_id.0).cloned())
    }
}
