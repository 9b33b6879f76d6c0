use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use homestash_core::domain::item::{Item, ItemId, MediaRef, NewItem, OwnerId};

use super::{ItemRepository, RepositoryError};
use crate::DbPool;

pub struct SqlItemRepository {
    pool: DbPool,
}

impl SqlItemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemRepository for SqlItemRepository {
    async fn save(&self, item: NewItem) -> Result<ItemId, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let tags_json = serde_json::to_string(&item.tags)
            .map_err(|err| RepositoryError::Decode(format!("failed to encode tags: {err}")))?;

        let result = sqlx::query(
            r#"
            INSERT INTO items (
                owner_id, name, description, photo_ref, tags, location,
                created_at, last_used
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.owner_id.0)
        .bind(item.display_name())
        .bind(&item.description)
        .bind(&item.photo_ref.0)
        .bind(&tags_json)
        .bind(&item.location)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(ItemId(result.last_insert_rowid()))
    }

    async fn list_for_owner(&self, owner_id: &OwnerId) -> Result<Vec<Item>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, name, description, photo_ref, tags, location,
                   created_at, last_used
            FROM items
            WHERE owner_id = ?
            ORDER BY id
            "#,
        )
        .bind(&owner_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    async fn find_stale(
        &self,
        owner_id: &OwnerId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Item>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, name, description, photo_ref, tags, location,
                   created_at, last_used
            FROM items
            WHERE owner_id = ? AND last_used < ?
            ORDER BY id
            "#,
        )
        .bind(&owner_id.0)
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }
}

fn item_from_row(row: &SqliteRow) -> Result<Item, RepositoryError> {
    let tags_raw: String = row.try_get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_raw)
        .map_err(|err| RepositoryError::Decode(format!("invalid item tags '{tags_raw}': {err}")))?;

    Ok(Item {
        id: ItemId(row.try_get("id")?),
        owner_id: OwnerId(row.try_get("owner_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        photo_ref: MediaRef(row.try_get("photo_ref")?),
        tags,
        location: row.try_get("location")?,
        created_at: parse_rfc3339("item created_at", &row.try_get::<String, _>("created_at")?)?,
        last_used: parse_rfc3339("item last_used", &row.try_get::<String, _>("last_used")?)?,
    })
}

fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)).map_err(|err| {
        RepositoryError::Decode(format!("invalid {} timestamp '{}': {}", field, value, err))
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use homestash_core::domain::item::{MediaRef, NewItem, OwnerId};

    use crate::repositories::{ItemRepository, SqlItemRepository};
    use crate::{connect_with_settings, migrations};

    fn new_item(owner: &str, description: &str, tags: &[&str]) -> NewItem {
        NewItem {
            owner_id: OwnerId(owner.to_owned()),
            name: None,
            description: description.to_owned(),
            photo_ref: MediaRef("file-abc".to_owned()),
            tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
            location: "Спальня".to_owned(),
        }
    }

    async fn repository() -> SqlItemRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlItemRepository::new(pool)
    }

    #[tokio::test]
    async fn save_assigns_id_and_stamps_timestamps() {
        let repo = repository().await;

        let id = repo
            .save(new_item("owner-1", "Паспорт в синей папке", &["паспорт", "папка"]))
            .await
            .expect("save");

        let items = repo
            .list_for_owner(&OwnerId("owner-1".to_owned()))
            .await
            .expect("list");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].name, "Без названия");
        assert_eq!(items[0].tags, vec!["паспорт", "папка"]);
        assert_eq!(items[0].created_at, items[0].last_used);
    }

    #[tokio::test]
    async fn list_is_partitioned_per_owner_in_insert_order() {
        let repo = repository().await;

        repo.save(new_item("owner-1", "первая", &[])).await.expect("save 1");
        repo.save(new_item("owner-2", "чужая", &[])).await.expect("save 2");
        repo.save(new_item("owner-1", "вторая", &[])).await.expect("save 3");

        let items = repo
            .list_for_owner(&OwnerId("owner-1".to_owned()))
            .await
            .expect("list");
        let descriptions: Vec<&str> =
            items.iter().map(|item| item.description.as_str()).collect();
        assert_eq!(descriptions, vec!["первая", "вторая"]);
    }

    #[tokio::test]
    async fn find_stale_honors_cutoff_boundary() {
        let repo = repository().await;
        let owner = OwnerId("owner-1".to_owned());

        repo.save(new_item("owner-1", "свежая вещь", &[])).await.expect("save");

        let cutoff = Utc::now() - Duration::days(30);
        let stale = repo.find_stale(&owner, cutoff).await.expect("stale query");
        assert!(stale.is_empty(), "a just-created item is not stale");

        // Age the row past the window.
        sqlx::query("UPDATE items SET last_used = ? WHERE owner_id = ?")
            .bind((Utc::now() - Duration::days(31)).to_rfc3339())
            .bind(&owner.0)
            .execute(&repo.pool)
            .await
            .expect("age row");

        let stale = repo.find_stale(&owner, cutoff).await.expect("stale query");
        assert_eq!(stale.len(), 1);
    }
}
