use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: String,
    pub title: String,
    pub url: String,
    pub trip_id: String,
}

impl Link {
    pub fn new(trip_id: &str, title: &str, url: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            url: url.to_string(),
            trip_id: trip_id.to_string(),
        }
    }

    pub async fn insert(pool: &DbPool, link: &Self) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO links (id, title, url, trip_id) VALUES (?1, ?2, ?3, ?4)")
            .bind(&link.id)
            .bind(&link.title)
            .bind(&link.url)
            .bind(&link.trip_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn find(pool: &DbPool, id: &str) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT id, title, url, trip_id FROM links WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_trip(pool: &DbPool, trip_id: &str) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, title, url, trip_id FROM links WHERE trip_id = ?1 ORDER BY title ASC",
        )
        .bind(trip_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &DbPool, id: &str) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM links WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
