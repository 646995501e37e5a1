use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor};
use uuid::Uuid;

use crate::db::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub is_owner: bool,
    pub is_confirmed: bool,
    pub trip_id: String,
}

impl Participant {
    /// The trip owner, confirmed from the start.
    pub fn owner(trip_id: &str, name: &str, email: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: Some(name.to_string()),
            email: email.to_string(),
            is_owner: true,
            is_confirmed: true,
            trip_id: trip_id.to_string(),
        }
    }

    /// An invited participant; stays unconfirmed until one of the confirm
    /// paths runs, and nameless unless the inviter supplied a name.
    pub fn invitee(trip_id: &str, name: Option<&str>, email: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.map(str::to_string),
            email: email.to_string(),
            is_owner: false,
            is_confirmed: false,
            trip_id: trip_id.to_string(),
        }
    }

    pub async fn insert(executor: impl SqliteExecutor<'_>, participant: &Self) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO participants (id, name, email, is_owner, is_confirmed, trip_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&participant.id)
        .bind(&participant.name)
        .bind(&participant.email)
        .bind(participant.is_owner)
        .bind(participant.is_confirmed)
        .bind(&participant.trip_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find(pool: &DbPool, id: &str) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, name, email, is_owner, is_confirmed, trip_id \
             FROM participants WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_for_trip(pool: &DbPool, trip_id: &str) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, name, email, is_owner, is_confirmed, trip_id \
             FROM participants WHERE trip_id = ?1 ORDER BY is_owner DESC, email ASC",
        )
        .bind(trip_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_owner(pool: &DbPool, trip_id: &str) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, name, email, is_owner, is_confirmed, trip_id \
             FROM participants WHERE trip_id = ?1 AND is_owner = 1",
        )
        .bind(trip_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(
        pool: &DbPool,
        trip_id: &str,
        email: &str,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, name, email, is_owner, is_confirmed, trip_id \
             FROM participants WHERE trip_id = ?1 AND email = ?2",
        )
        .bind(trip_id)
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Marks the participant confirmed; the transition is one-way. A name is
    /// only written when supplied (the one-click path never sets one).
    pub async fn confirm(pool: &DbPool, id: &str, name: Option<&str>) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE participants SET is_confirmed = 1, name = COALESCE(?2, name) WHERE id = ?1",
        )
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &DbPool, id: &str) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM participants WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
