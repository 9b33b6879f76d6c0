use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use homestash_core::domain::item::{MediaRef, OwnerId};
use homestash_core::domain::map::FloorMap;

use super::{MapRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMapRepository {
    pool: DbPool,
}

impl SqlMapRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MapRepository for SqlMapRepository {
    async fn upsert(&self, map: FloorMap) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO maps (owner_id, image_ref, width, height)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(owner_id) DO UPDATE SET
                image_ref = excluded.image_ref,
                width = excluded.width,
                height = excluded.height
            "#,
        )
        .bind(&map.owner_id.0)
        .bind(&map.image_ref.0)
        .bind(i64::from(map.width))
        .bind(i64::from(map.height))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_owner(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Option<FloorMap>, RepositoryError> {
        let row = sqlx::query(
            "SELECT owner_id, image_ref, width, height FROM maps WHERE owner_id = ?",
        )
        .bind(&owner_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|value| map_from_row(&value)).transpose()
    }
}

fn map_from_row(row: &SqliteRow) -> Result<FloorMap, RepositoryError> {
    let width: i64 = row.try_get("width")?;
    let height: i64 = row.try_get("height")?;

    let width = u32::try_from(width)
        .map_err(|_| RepositoryError::Decode(format!("invalid map width: {width}")))?;
    let height = u32::try_from(height)
        .map_err(|_| RepositoryError::Decode(format!("invalid map height: {height}")))?;

    Ok(FloorMap {
        owner_id: OwnerId(row.try_get("owner_id")?),
        image_ref: MediaRef(row.try_get("image_ref")?),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use homestash_core::domain::item::{MediaRef, OwnerId};
    use homestash_core::domain::map::FloorMap;

    use crate::repositories::{MapRepository, SqlMapRepository};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlMapRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlMapRepository::new(pool)
    }

    fn floor_map(owner: &str, image: &str, width: u32, height: u32) -> FloorMap {
        FloorMap {
            owner_id: OwnerId(owner.to_owned()),
            image_ref: MediaRef(image.to_owned()),
            width,
            height,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row_for_owner() {
        let repo = repository().await;
        let owner = OwnerId("owner-1".to_owned());

        repo.upsert(floor_map("owner-1", "map-v1", 300, 400)).await.expect("first save");
        repo.upsert(floor_map("owner-1", "map-v2", 640, 480)).await.expect("second save");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM maps WHERE owner_id = ?")
            .bind(&owner.0)
            .fetch_one(&repo.pool)
            .await
            .expect("count");
        assert_eq!(count, 1);

        let map = repo.find_by_owner(&owner).await.expect("find").expect("map exists");
        assert_eq!(map.image_ref.0, "map-v2");
        assert_eq!((map.width, map.height), (640, 480));
    }

    #[tokio::test]
    async fn find_by_owner_is_absent_for_unknown_owner() {
        let repo = repository().await;

        let map = repo
            .find_by_owner(&OwnerId("nobody".to_owned()))
            .await
            .expect("query succeeds");
        assert!(map.is_none());
    }
}
